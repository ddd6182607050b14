//! `recdash service` — load/unload the watcher launch agent.

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};

use recdash_server::control::{self, ServiceAction};
use recdash_server::SystemLaunchctl;

use super::PathArgs;

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum ActionArg {
    Start,
    Stop,
    Restart,
}

impl From<ActionArg> for ServiceAction {
    fn from(action: ActionArg) -> Self {
        match action {
            ActionArg::Start => ServiceAction::Start,
            ActionArg::Stop => ServiceAction::Stop,
            ActionArg::Restart => ServiceAction::Restart,
        }
    }
}

#[derive(Args, Debug)]
pub struct ServiceArgs {
    #[arg(value_enum)]
    pub action: ActionArg,

    #[command(flatten)]
    pub paths: PathArgs,
}

impl ServiceArgs {
    pub fn run(self) -> Result<()> {
        let settings = self.paths.settings()?;
        let action = ServiceAction::from(self.action);
        control::perform(&SystemLaunchctl, action, &settings.launch_agent_plist)
            .with_context(|| format!("failed to {:?} the watcher service", self.action))?;
        println!("{}", action.confirmation());
        Ok(())
    }
}
