//! Direct container operations within the current namespace

use anyhow::Result;

use crate::backend::docker;
use crate::cli::ContainerCreateArgs;
use crate::topology::{Backend, NodeSpec};
use crate::Context;

pub fn list(ctx: &Context) -> Result<()> {
    print!("{}", docker::list_containers(&ctx.namespace)?);
    Ok(())
}

pub fn create(ctx: &Context, args: &ContainerCreateArgs) -> Result<()> {
    docker::create_network(&ctx.namespace)?;
    let spec = NodeSpec {
        name: args.name.clone(),
        os: Some(args.os.clone()),
        backend: Backend::Docker,
        privileged: args.privileged,
        expose_port: args.expose.clone(),
        memory: ctx.memory.clone(),
        cpus: ctx.cpus.clone(),
        directives: Vec::new(),
    };
    docker::create_container(&ctx.namespace, &spec, &args.os)
}
