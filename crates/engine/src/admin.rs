// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Administrative requests against a running server.

use crate::error::EngineError;
use crate::server::{AgentServer, ServerStatus};
use crate::script::ScriptRunner;
use ag_core::{Clock, ConditionStatus, InstanceId, ScriptRun, TimerStatus, Value};
use ag_storage::SnapshotStore;
use serde::{Deserialize, Serialize};

/// Administrative request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Status,
    Pause,
    Resume,
    ListInstances {
        /// Only this user's instances (None = all)
        #[serde(default)]
        user: Option<String>,
    },
    EnableInstance {
        user: String,
        instance: String,
    },
    DisableInstance {
        user: String,
        instance: String,
    },
    EnableTimer {
        user: String,
        instance: String,
        timer: String,
    },
    DisableTimer {
        user: String,
        instance: String,
        timer: String,
    },
    EnableCondition {
        user: String,
        instance: String,
        condition: String,
    },
    DisableCondition {
        user: String,
        instance: String,
        condition: String,
    },
    TimerStatus {
        user: String,
        instance: String,
        timer: String,
    },
    ConditionStatus {
        user: String,
        instance: String,
        condition: String,
    },
    RunScript {
        user: String,
        instance: String,
        script: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    ReleaseInstance {
        user: String,
        instance: String,
    },
}

/// Summary of an instance for listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub id: InstanceId,
    pub user: String,
    pub name: String,
    pub definition: String,
    pub enabled: bool,
    pub auto_created: bool,
}

/// Administrative response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Generic success
    Ok,
    Status { status: ServerStatus },
    Instances { instances: Vec<InstanceSummary> },
    TimerStatus { status: TimerStatus },
    ConditionStatus { status: ConditionStatus },
    ScriptRun { run: ScriptRun },
    /// Ids of every released instance, the requested one first
    Released { instances: Vec<InstanceId> },
    Error { message: String },
}

impl<R: ScriptRunner, S: SnapshotStore, C: Clock> AgentServer<R, S, C> {
    /// Handle a request, folding errors into [`Response::Error`].
    pub async fn handle(&self, request: Request) -> Response {
        tracing::debug!(?request, "admin request");
        match self.handle_inner(request).await {
            Ok(response) => response,
            Err(e) => Response::Error { message: e.to_string() },
        }
    }

    async fn handle_inner(&self, request: Request) -> Result<Response, EngineError> {
        let rt = self.runtime();
        let response = match request {
            Request::Status => Response::Status { status: self.status() },
            Request::Pause => {
                self.pause();
                Response::Ok
            }
            Request::Resume => {
                self.resume();
                Response::Ok
            }
            Request::ListInstances { user } => {
                let instances = rt
                    .instances()
                    .into_iter()
                    .filter(|i| user.as_deref().map_or(true, |u| i.user() == u))
                    .map(|i| InstanceSummary {
                        id: i.id().clone(),
                        user: i.user().to_string(),
                        name: i.name().to_string(),
                        definition: i.definition().name.clone(),
                        enabled: i.is_enabled(),
                        auto_created: i.is_auto_created(),
                    })
                    .collect();
                Response::Instances { instances }
            }
            Request::EnableInstance { user, instance } => {
                rt.enable(&rt.instance(&user, &instance)?).await?;
                Response::Ok
            }
            Request::DisableInstance { user, instance } => {
                rt.disable(&rt.instance(&user, &instance)?);
                Response::Ok
            }
            Request::EnableTimer { user, instance, timer } => {
                rt.enable_timer(&rt.instance(&user, &instance)?, &timer).await?;
                Response::Ok
            }
            Request::DisableTimer { user, instance, timer } => {
                rt.disable_timer(&*rt.instance(&user, &instance)?, &timer)?;
                Response::Ok
            }
            Request::EnableCondition { user, instance, condition } => {
                rt.enable_condition(&rt.instance(&user, &instance)?, &condition).await?;
                Response::Ok
            }
            Request::DisableCondition { user, instance, condition } => {
                rt.disable_condition(&*rt.instance(&user, &instance)?, &condition)?;
                Response::Ok
            }
            Request::TimerStatus { user, instance, timer } => Response::TimerStatus {
                status: rt.timer_status(&*rt.instance(&user, &instance)?, &timer)?,
            },
            Request::ConditionStatus { user, instance, condition } => Response::ConditionStatus {
                status: rt.condition_status(&*rt.instance(&user, &instance)?, &condition)?,
            },
            Request::RunScript { user, instance, script, args } => {
                let instance = rt.instance(&user, &instance)?;
                Response::ScriptRun { run: rt.run_script(&instance, &script, &args).await? }
            }
            Request::ReleaseInstance { user, instance } => {
                Response::Released { instances: rt.release(&rt.instance(&user, &instance)?)? }
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
#[path = "admin_tests.rs"]
mod tests;
