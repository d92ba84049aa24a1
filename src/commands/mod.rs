pub mod container;
pub mod deploy;
pub mod exec;
pub mod namespace;
pub mod playbook;
pub mod update;
