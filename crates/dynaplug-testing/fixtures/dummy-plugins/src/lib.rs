//! Plugins built against the current API version.

use std::sync::atomic::{AtomicI32, Ordering};

use dynaplug_testing::interfaces::{DoubleBase, IntBase, NameBase, SetterBase, DUMMY_MULTI_DOUBLE};
use parking_lot::Mutex;

#[derive(Default)]
pub struct DummySinglePlugin;

impl NameBase for DummySinglePlugin {
    fn my_name_is(&self) -> String {
        "DummySinglePlugin".to_owned()
    }
}

pub struct DummyMultiPlugin {
    name: Mutex<String>,
    value: Mutex<f64>,
    int_value: AtomicI32,
}

impl Default for DummyMultiPlugin {
    fn default() -> Self {
        Self {
            name: Mutex::new("DummyMultiPlugin".to_owned()),
            value: Mutex::new(DUMMY_MULTI_DOUBLE),
            int_value: AtomicI32::new(5),
        }
    }
}

impl NameBase for DummyMultiPlugin {
    fn my_name_is(&self) -> String {
        self.name.lock().clone()
    }
}

impl DoubleBase for DummyMultiPlugin {
    fn my_double_value_is(&self) -> f64 {
        *self.value.lock()
    }
}

impl IntBase for DummyMultiPlugin {
    fn my_integer_value_is(&self) -> i32 {
        self.int_value.load(Ordering::SeqCst)
    }
}

impl SetterBase for DummyMultiPlugin {
    fn set_name(&self, name: &str) {
        *self.name.lock() = name.to_owned();
    }

    fn set_double_value(&self, value: f64) {
        *self.value.lock() = value;
    }

    fn set_integer_value(&self, value: i32) {
        self.int_value.store(value, Ordering::SeqCst);
    }
}

dynaplug_sdk::register_plugins! {
    DummySinglePlugin => [dyn NameBase],
    DummyMultiPlugin => [dyn NameBase, dyn DoubleBase, dyn IntBase, dyn SetterBase],
}
