use std::collections::BTreeMap;

use haier_home_device::session::StateStore;
use haier_home_device::state::{Field, StateUpdate, StateValue};

/// Mirrors the unit's state in memory and prints whatever changes.
#[derive(Debug, Default)]
pub struct ConsoleStore {
    states: BTreeMap<Field, StateValue>,
}

impl StateStore for ConsoleStore {
    fn set_state(&mut self, StateUpdate { field, value, ack }: StateUpdate) {
        debug!("set {} = {} (ack: {})", field, value, ack);
        // connection=false is republished on every failed retry
        if self.states.get(&field) != Some(&value) {
            println!("{} = {}", field, value);
            self.states.insert(field, value);
        }
    }
}
