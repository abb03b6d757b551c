#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use hkcontrol::{
    ActionResult, ControlError, ControlEvent, DeviceId, DeviceList, DirectoryChild,
    DirectoryListing, ServiceCall, Subscription, SubscriptionSender, TransportGateway,
};

/// In-memory gateway: records every call, answers from scripts and hands
/// the producing side of each subscription to the test.
#[derive(Default)]
pub struct ScriptedGateway {
    pub devices: Mutex<DeviceList>,
    pub listings: Mutex<HashMap<String, Vec<DirectoryChild>>>,
    pub browsed: Mutex<Vec<String>>,
    pub calls: Mutex<Vec<(DeviceId, ServiceCall)>>,
    pub action_results: Mutex<VecDeque<Result<ActionResult, ControlError>>>,
    pub subscriptions: Mutex<Vec<(DeviceId, String, SubscriptionSender)>>,
    pub refuse_subscriptions: Mutex<bool>,
    /// When set, every action waits for a notification before answering.
    pub action_gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listing(self, container_id: &str, children: Vec<DirectoryChild>) -> Self {
        self.listings
            .lock()
            .unwrap()
            .insert(container_id.to_string(), children);
        self
    }

    pub fn push_result(&self, result: Result<ActionResult, ControlError>) {
        self.action_results.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Holds every following action until the returned gate is notified.
    pub fn hold_actions(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.action_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Producing side of the most recent subscription.
    pub fn last_sender(&self) -> Option<SubscriptionSender> {
        self.subscriptions
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, tx)| tx.clone())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }
}

#[async_trait]
impl TransportGateway for ScriptedGateway {
    async fn list_devices(&self) -> Result<DeviceList, ControlError> {
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn browse_directory(
        &self,
        _device: &DeviceId,
        container_id: &str,
    ) -> Result<DirectoryListing, ControlError> {
        self.browsed.lock().unwrap().push(container_id.to_string());
        let children = self
            .listings
            .lock()
            .unwrap()
            .get(container_id)
            .cloned()
            .ok_or_else(|| ControlError::HttpStatus {
                status: 404,
                reason: "Not Found".to_string(),
            })?;
        Ok(DirectoryListing {
            child_count: Some(children.len() as u32),
            children,
        })
    }

    async fn invoke_action(
        &self,
        device: &DeviceId,
        call: &ServiceCall,
    ) -> Result<ActionResult, ControlError> {
        self.calls
            .lock()
            .unwrap()
            .push((device.clone(), call.clone()));
        let gate = self.action_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.action_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(ActionResult {
                    status_code: 201,
                    message: String::new(),
                })
            })
    }

    async fn subscribe(
        &self,
        device: &DeviceId,
        instance_id: &str,
    ) -> Result<Subscription, ControlError> {
        if *self.refuse_subscriptions.lock().unwrap() {
            return Err(ControlError::transport("ConnectError", "connection refused"));
        }
        let (tx, subscription) = Subscription::channel();
        self.subscriptions
            .lock()
            .unwrap()
            .push((device.clone(), instance_id.to_string(), tx));
        Ok(subscription)
    }
}

pub fn failures(rx: &crossbeam_channel::Receiver<ControlEvent>) -> Vec<String> {
    rx.try_iter()
        .filter_map(|event| match event {
            ControlEvent::ActionFailed(failure) => Some(failure.summary),
            _ => None,
        })
        .collect()
}

pub fn container(id: &str, title: &str) -> DirectoryChild {
    DirectoryChild {
        id: id.to_string(),
        title: title.to_string(),
        is_container: true,
        ..Default::default()
    }
}

pub fn track(id: &str, title: &str, uri: &str) -> DirectoryChild {
    DirectoryChild {
        id: id.to_string(),
        title: title.to_string(),
        mime_type: Some("audio/flac".to_string()),
        uri: Some(uri.to_string()),
        ..Default::default()
    }
}

/// Lets spawned tasks run on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
