//! Application settings model and stack information resolution.
//!
//! Applications are declared in a multi-document YAML file. Each one may
//! inherit from a model application and declares, per environment, a table of
//! pools whose properties become the parameters of a CloudFormation stack.

mod collection;
mod definition;
mod resolver;
mod stack_name;

pub use collection::{Application, Applications};
pub use definition::{
    ApplicationDefinition, ENVIRONMENT_KEY, ENVIRONMENTS_KEY, LIVE_KEY, MODEL_KEY, NAME_KEY, PoolOverride,
    PoolTable, PropertyMap, PropertyValue, SHORT_NAME_KEY, TYPE_KEY, pattern_identifiers, property_as_u32,
    property_to_string,
};
pub use resolver::MAX_MODEL_DEPTH;
pub use stack_name::{StackName, short_name_of};

/// Whether mutating this stack calls for the live-production warning.
pub fn is_live_production(stack_info: &PropertyMap) -> bool {
    let live = stack_info
        .get(LIVE_KEY)
        .and_then(PropertyValue::as_bool)
        .unwrap_or(false);
    let production = stack_info
        .get(ENVIRONMENT_KEY)
        .and_then(PropertyValue::as_str)
        == Some("production");
    live && production
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_live_production() {
        let mut info = PropertyMap::new();
        info.insert(LIVE_KEY.to_string(), PropertyValue::Bool(true));
        info.insert(ENVIRONMENT_KEY.to_string(), PropertyValue::from("production"));
        assert!(is_live_production(&info));

        info.insert(ENVIRONMENT_KEY.to_string(), PropertyValue::from("stage"));
        assert!(!is_live_production(&info));

        info.insert(ENVIRONMENT_KEY.to_string(), PropertyValue::from("production"));
        info.insert(LIVE_KEY.to_string(), PropertyValue::Bool(false));
        assert!(!is_live_production(&info));
    }
}
