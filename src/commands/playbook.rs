//! Re-run the provisioning playbook over an existing inventory

use anyhow::Result;

use crate::backend::ansible::{self, PlaybookRun};
use crate::exit;
use crate::Context;

pub fn run(ctx: &Context) -> Result<()> {
    if ansible::run_playbook(&ctx.namespace, ctx.verbose)? == PlaybookRun::Failed {
        std::process::exit(exit::PLAYBOOK_FAILED);
    }
    Ok(())
}
