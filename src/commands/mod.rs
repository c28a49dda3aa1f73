use anyhow::Result;
use std::sync::Arc;

use crate::{
    plugin::{HostContext, Plugin},
    runtime::Runtime,
};

mod packages;
mod workspace;

pub use packages::{packages, render_packages};
pub use workspace::{WorkspaceAction, workspace};

/// Activate the plugin for a host running in the current directory.
#[tracing::instrument(skip(runtime))]
pub fn activate<R: Runtime + 'static>(runtime: Arc<R>, root_version: &str) -> Result<Plugin<R>> {
    let working_dir = runtime.current_dir()?;
    let host = HostContext::load(runtime.as_ref(), &working_dir, root_version)?;
    Ok(Plugin::activate(runtime, &host))
}
