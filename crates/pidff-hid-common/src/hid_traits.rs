//! HID report transport traits

use std::time::Duration;

use crate::HidCommonResult;

/// Direction and kind of one report transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportTransfer {
    /// Output report written on the interrupt or control pipe
    Output,
    /// Feature report written with SET_REPORT
    SetFeature,
    /// Feature report read with GET_REPORT
    GetFeature,
}

/// In-order report channel to one device.
///
/// Every buffer starts with the report id byte (0 for unnumbered reports).
/// Implementations must deliver writes in call order.
pub trait HidTransport: Send {
    fn write_output_report(&mut self, data: &[u8]) -> HidCommonResult<()>;

    fn set_feature_report(&mut self, data: &[u8]) -> HidCommonResult<()>;

    /// Reads feature report `report_id`; `len` includes the id byte.
    fn get_feature_report(&mut self, report_id: u8, len: usize) -> HidCommonResult<Vec<u8>>;

    /// Blocks until every report written so far has been applied by the
    /// device, or `timeout` elapses.
    fn flush(&mut self, _timeout: Duration) -> HidCommonResult<()> {
        Ok(())
    }
}

impl<T: HidTransport + ?Sized> HidTransport for Box<T> {
    fn write_output_report(&mut self, data: &[u8]) -> HidCommonResult<()> {
        (**self).write_output_report(data)
    }

    fn set_feature_report(&mut self, data: &[u8]) -> HidCommonResult<()> {
        (**self).set_feature_report(data)
    }

    fn get_feature_report(&mut self, report_id: u8, len: usize) -> HidCommonResult<Vec<u8>> {
        (**self).get_feature_report(report_id, len)
    }

    fn flush(&mut self, timeout: Duration) -> HidCommonResult<()> {
        (**self).flush(timeout)
    }
}

pub mod mock {
    //! Recording transport for tests.
    //!
    //! Clones share state, so a test can hand one clone to the device and
    //! inspect traffic through another.

    use super::*;
    use crate::HidCommonError;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::{Arc, Mutex};
    use tracing::debug;

    /// One recorded transaction.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedReport {
        pub transfer: ReportTransfer,
        pub data: Vec<u8>,
    }

    #[derive(Default)]
    struct MockState {
        history: Vec<RecordedReport>,
        queued_features: HashMap<u8, VecDeque<Vec<u8>>>,
        sticky_features: HashMap<u8, Vec<u8>>,
        rejected_ids: HashSet<u8>,
        holding: bool,
        connected: bool,
    }

    #[derive(Clone)]
    pub struct MockHidTransport {
        state: Arc<Mutex<MockState>>,
    }

    impl MockHidTransport {
        pub fn new() -> Self {
            Self {
                state: Arc::new(Mutex::new(MockState {
                    connected: true,
                    ..MockState::default()
                })),
            }
        }

        fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            f(&mut state)
        }

        /// Answers the next read of `report_id` with `data`.
        pub fn queue_feature_response(&self, report_id: u8, data: Vec<u8>) {
            self.with_state(|s| {
                s.queued_features
                    .entry(report_id)
                    .or_default()
                    .push_back(data);
            });
        }

        /// Answers every read of `report_id` with `data` once the queue is
        /// drained.
        pub fn set_feature_response(&self, report_id: u8, data: Vec<u8>) {
            self.with_state(|s| {
                s.sticky_features.insert(report_id, data);
            });
        }

        /// Makes every write of `report_id` fail.
        pub fn reject_report(&self, report_id: u8) {
            self.with_state(|s| {
                s.rejected_ids.insert(report_id);
            });
        }

        /// While held, `flush` reports the writes as not yet applied.
        pub fn hold_writes(&self, holding: bool) {
            self.with_state(|s| s.holding = holding);
        }

        pub fn disconnect(&self) {
            self.with_state(|s| s.connected = false);
        }

        pub fn history(&self) -> Vec<RecordedReport> {
            self.with_state(|s| s.history.clone())
        }

        /// Output reports written so far, in order.
        pub fn output_reports(&self) -> Vec<Vec<u8>> {
            self.with_state(|s| {
                s.history
                    .iter()
                    .filter(|r| r.transfer == ReportTransfer::Output)
                    .map(|r| r.data.clone())
                    .collect()
            })
        }

        pub fn clear_history(&self) {
            self.with_state(|s| s.history.clear());
        }

        fn record_write(&self, transfer: ReportTransfer, data: &[u8]) -> HidCommonResult<()> {
            self.with_state(|s| {
                if !s.connected {
                    return Err(HidCommonError::Disconnected);
                }
                let report_id = data.first().copied().unwrap_or(0);
                if s.rejected_ids.contains(&report_id) {
                    debug!(report_id, "mock transport rejecting write");
                    return Err(HidCommonError::WriteError {
                        report_id,
                        reason: "rejected by mock".to_string(),
                    });
                }
                s.history.push(RecordedReport {
                    transfer,
                    data: data.to_vec(),
                });
                Ok(())
            })
        }
    }

    impl Default for MockHidTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl HidTransport for MockHidTransport {
        fn write_output_report(&mut self, data: &[u8]) -> HidCommonResult<()> {
            self.record_write(ReportTransfer::Output, data)
        }

        fn set_feature_report(&mut self, data: &[u8]) -> HidCommonResult<()> {
            self.record_write(ReportTransfer::SetFeature, data)
        }

        fn get_feature_report(&mut self, report_id: u8, len: usize) -> HidCommonResult<Vec<u8>> {
            self.with_state(|s| {
                if !s.connected {
                    return Err(HidCommonError::Disconnected);
                }
                let queued = s
                    .queued_features
                    .get_mut(&report_id)
                    .and_then(VecDeque::pop_front);
                let mut data = match queued.or_else(|| s.sticky_features.get(&report_id).cloned()) {
                    Some(data) => data,
                    None => {
                        return Err(HidCommonError::ReadError {
                            report_id,
                            reason: "no response scripted".to_string(),
                        });
                    }
                };
                data.resize(len, 0);
                s.history.push(RecordedReport {
                    transfer: ReportTransfer::GetFeature,
                    data: data.clone(),
                });
                Ok(data)
            })
        }

        fn flush(&mut self, timeout: Duration) -> HidCommonResult<()> {
            if self.with_state(|s| s.holding) {
                return Err(HidCommonError::Timeout(
                    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                ));
            }
            Ok(())
        }
    }
}
