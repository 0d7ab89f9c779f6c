//! Camera link
//!
//! Request/response access to the camera's REST control surface, the
//! busy-retry shutter primitive, and the destructive event-buffer drain.
//!
//! The raw resource calls (`post_command`, `get_resource`, `delete_resource`)
//! turn a timeout or connection failure into `None` after logging it; the
//! higher-level operations decide whether an empty answer is fatal.

use super::http::{CameraRequest, CameraResponse, CameraTransport};
use crate::firmware::ccapi::{
    resources, shutter_payload, BatteryStatus, CurrentDirectory, DirectoryEntryCount,
    PollingEvents, ShutterAction,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use stackshot_core::{CameraError, ProtocolError, Result};
use std::thread;
use std::time::Duration;

/// Retry policy for the shutter-busy condition
///
/// Only the busy status is retried. `max_attempts = None` retries until the
/// camera accepts or fails differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyRetryPolicy {
    /// Pause between press attempts
    pub delay: Duration,
    /// Cap on press attempts, including the first
    pub max_attempts: Option<u32>,
}

impl BusyRetryPolicy {
    /// Retry forever with a fixed delay
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `max_attempts` press attempts
    pub fn bounded(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(max_attempts),
        }
    }

    fn allows_another(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

impl Default for BusyRetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_millis(150))
    }
}

/// Outcome of an accepted press/release pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutterReport {
    /// Press attempts issued, including busy rejections
    pub press_attempts: u32,
}

impl ShutterReport {
    /// Press attempts rejected as busy
    pub fn busy_retries(&self) -> u32 {
        self.press_attempts.saturating_sub(1)
    }
}

/// Files the camera reported as added since the previous drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraEventBatch {
    /// Resource paths of the new files
    pub added: Vec<String>,
}

impl CameraEventBatch {
    /// Number of added files
    pub fn len(&self) -> usize {
        self.added.len()
    }

    /// No files were added
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
    }
}

/// REST link to the camera
pub struct CameraLink<T: CameraTransport> {
    transport: T,
    retry: BusyRetryPolicy,
    release_settle: Duration,
}

impl<T: CameraTransport> CameraLink<T> {
    /// Wrap a transport with the default busy policy and no settle delay
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: BusyRetryPolicy::default(),
            release_settle: Duration::ZERO,
        }
    }

    /// Replace the busy retry policy
    pub fn with_retry_policy(mut self, retry: BusyRetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Pause after an accepted release so the camera can store the image
    pub fn with_release_settle(mut self, release_settle: Duration) -> Self {
        self.release_settle = release_settle;
        self
    }

    /// Current busy retry policy
    pub fn retry_policy(&self) -> BusyRetryPolicy {
        self.retry
    }

    /// Borrow the transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport
    pub fn into_inner(self) -> T {
        self.transport
    }

    fn execute(&mut self, request: CameraRequest) -> Option<CameraResponse> {
        tracing::debug!("Camera {} {}", request.method, request.resource);
        match self.transport.execute(&request) {
            Ok(response) => {
                tracing::debug!(
                    "Camera {} {} -> {}",
                    request.method,
                    request.resource,
                    response.status
                );
                Some(response)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// POST a JSON command to a resource
    pub fn post_command(&mut self, resource: &str, payload: &Value) -> Option<CameraResponse> {
        self.execute(CameraRequest::post(resource, payload.clone()))
    }

    /// GET a resource
    pub fn get_resource(&mut self, resource: &str) -> Option<CameraResponse> {
        self.execute(CameraRequest::get(resource))
    }

    /// DELETE a resource
    pub fn delete_resource(&mut self, resource: &str) -> Option<CameraResponse> {
        self.execute(CameraRequest::delete(resource))
    }

    /// Confirm the camera answers on its API root
    pub fn open(&mut self) -> Result<()> {
        let response = self
            .get_resource(resources::ROOT)
            .ok_or_else(|| CameraError::NoResponse {
                action: "session check".to_string(),
            })?;
        if !response.is_success() {
            return Err(rejected("session check", &response).into());
        }
        tracing::info!("Camera session established");
        Ok(())
    }

    /// Press and release the shutter button
    ///
    /// A busy press is re-issued after the policy delay until it is
    /// accepted, fails differently, or the policy cap is reached. The release
    /// is only sent after an accepted press.
    pub fn trigger_shutter(&mut self, autofocus: bool) -> Result<ShutterReport> {
        let press = shutter_payload(ShutterAction::FullPress, autofocus);
        let mut attempts = 0;

        let response = loop {
            attempts += 1;
            let response = self
                .post_command(resources::SHUTTER_BUTTON_MANUAL, &press)
                .ok_or_else(|| CameraError::NoResponse {
                    action: ShutterAction::FullPress.to_string(),
                })?;

            if !response.is_busy() {
                break response;
            }

            if !self.retry.allows_another(attempts) {
                tracing::error!("Camera still busy after {} press attempts", attempts);
                return Err(CameraError::BusyRetriesExhausted { attempts }.into());
            }

            tracing::warn!("Camera busy, retrying shutter press (attempt {})", attempts);
            thread::sleep(self.retry.delay);
        };

        if !response.is_success() {
            return Err(rejected(ShutterAction::FullPress.as_str(), &response).into());
        }

        let release = shutter_payload(ShutterAction::Release, autofocus);
        let response = self
            .post_command(resources::SHUTTER_BUTTON_MANUAL, &release)
            .ok_or_else(|| CameraError::NoResponse {
                action: ShutterAction::Release.to_string(),
            })?;
        if !response.is_success() {
            return Err(rejected(ShutterAction::Release.as_str(), &response).into());
        }

        tracing::debug!("Camera image captured after {} press attempt(s)", attempts);
        if !self.release_settle.is_zero() {
            thread::sleep(self.release_settle);
        }

        Ok(ShutterReport {
            press_attempts: attempts,
        })
    }

    /// Read and clear the event polling buffer
    ///
    /// Returns `None` when the camera did not answer or the body is not a
    /// polling payload. A payload without `addedcontents` is an empty batch.
    pub fn drain_events(&mut self) -> Option<CameraEventBatch> {
        let response = self.get_resource(resources::EVENT_POLLING)?;
        if !response.is_success() {
            tracing::warn!("Event polling returned status {}", response.status);
            return None;
        }

        match response.json::<PollingEvents>() {
            Ok(events) => Some(CameraEventBatch {
                added: events.addedcontents.unwrap_or_default(),
            }),
            Err(e) => {
                tracing::warn!("Malformed event polling payload: {}", e);
                None
            }
        }
    }

    fn get_json<D: DeserializeOwned>(&mut self, resource: &str) -> Result<D> {
        let response = self
            .get_resource(resource)
            .ok_or_else(|| CameraError::NoResponse {
                action: format!("GET {}", resource),
            })?;
        if !response.is_success() {
            return Err(rejected(resource, &response).into());
        }
        response.json::<D>().map_err(|e| {
            ProtocolError::MalformedResponse {
                resource: resource.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Battery status of the camera
    pub fn battery_status(&mut self) -> Result<BatteryStatus> {
        self.get_json(resources::BATTERY)
    }

    /// Folder receiving new captures
    pub fn current_directory(&mut self) -> Result<CurrentDirectory> {
        self.get_json(resources::CURRENT_DIRECTORY)
    }

    /// Entry and page count of a folder
    pub fn directory_entry_count(&mut self, path: &str) -> Result<DirectoryEntryCount> {
        let resource = resources::entry_count_path(path);
        let count: DirectoryEntryCount = self.get_json(&resource)?;
        if count.contentsnumber.is_none() {
            return Err(ProtocolError::MissingField {
                resource,
                field: "contentsnumber".to_string(),
            }
            .into());
        }
        Ok(count)
    }

    /// Download the bytes of a stored file
    pub fn fetch_content(&mut self, path: &str) -> Result<Vec<u8>> {
        let response = self
            .get_resource(path)
            .ok_or_else(|| CameraError::NoResponse {
                action: format!("GET {}", path),
            })?;
        if !response.is_success() {
            return Err(rejected(path, &response).into());
        }
        Ok(response.body)
    }

    /// Delete a stored file
    pub fn delete_content(&mut self, path: &str) -> Result<()> {
        let response = self
            .delete_resource(path)
            .ok_or_else(|| CameraError::NoResponse {
                action: format!("DELETE {}", path),
            })?;
        if !response.is_success() {
            tracing::warn!("Error deleting {}: status {}", path, response.status);
            return Err(rejected(path, &response).into());
        }
        Ok(())
    }
}

fn rejected(action: &str, response: &CameraResponse) -> CameraError {
    CameraError::Rejected {
        action: action.to_string(),
        status: response.status,
        message: response.message(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_caps() {
        let policy = BusyRetryPolicy::bounded(Duration::ZERO, 3);
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));

        let policy = BusyRetryPolicy::unbounded(Duration::ZERO);
        assert!(policy.allows_another(u32::MAX - 1));
    }

    #[test]
    fn test_shutter_report_busy_retries() {
        assert_eq!(ShutterReport { press_attempts: 3 }.busy_retries(), 2);
        assert_eq!(ShutterReport { press_attempts: 1 }.busy_retries(), 0);
    }
}
