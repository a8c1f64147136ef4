//! Interfaces shared by the fixture plugins and the tests that load them.

use dynaplug_sdk::declare_interface;

pub trait NameBase: Send + Sync {
    fn my_name_is(&self) -> String;
}

pub trait DoubleBase: Send + Sync {
    fn my_double_value_is(&self) -> f64;
}

pub trait IntBase: Send + Sync {
    fn my_integer_value_is(&self) -> i32;
}

/// Mutators for the values reported by the other interfaces.
pub trait SetterBase: Send + Sync {
    fn set_name(&self, name: &str);
    fn set_double_value(&self, value: f64);
    fn set_integer_value(&self, value: i32);
}

/// Implemented by no fixture plugin.
pub trait SomeInterface: Send + Sync {}

/// Initial `DoubleBase` value of `DummyMultiPlugin`.
#[allow(clippy::approx_constant)]
pub const DUMMY_MULTI_DOUBLE: f64 = 3.14159;

declare_interface!(NameBase);
declare_interface!(DoubleBase);
declare_interface!(IntBase);
declare_interface!(SetterBase);
declare_interface!(SomeInterface);

#[cfg(test)]
mod tests {
    use dynaplug_sdk::Interface;

    use super::*;

    #[test]
    fn test_interface_names() {
        assert_eq!(
            <dyn NameBase as Interface>::NAME,
            "dynaplug_testing::interfaces::NameBase"
        );
        assert_eq!(
            <dyn SomeInterface as Interface>::NAME,
            "dynaplug_testing::interfaces::SomeInterface"
        );
    }
}
