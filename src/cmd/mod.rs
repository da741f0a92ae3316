/*!
 * Actual operation handlers
 */

use std::sync::Arc;

use crate::schedule::ScheduleProvider;
use crate::store::Store;

pub mod admin;
pub mod player;

/// Everything an operation needs, shared by all requests
#[derive(Clone)]
pub struct AppContext {
    pub store: Arc<dyn Store>,
    pub schedule: Arc<dyn ScheduleProvider>,
    /// Refuse picks on games that already kicked off
    pub enforce_kickoff: bool,
    /// Rows per read when scanning a whole table
    pub batch_size: i64,
}

impl AppContext {
    pub fn new(store: Arc<dyn Store>, schedule: Arc<dyn ScheduleProvider>) -> Self {
        Self { store, schedule, enforce_kickoff: false, batch_size: 1000 }
    }
}
