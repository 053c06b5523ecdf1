//! Stack information resolution integration tests
//!
//! Loads application settings from disk and resolves stack names through the
//! public API, then builds the template parameters they produce.

use std::fs;

use awstools::application::{Applications, PropertyMap, PropertyValue, is_live_production};
use awstools::error::{ApplicationError, AwsToolsError};
use awstools::template::{CfnParameters, CfnTemplate, resolve_template_path};
use tempfile::TempDir;

const SETTINGS: &str = r#"
Application: appmodel
ShortName: am
KeyName: keymodel
live: false
environments:
    production:
        python:
            template: python.js
            InstanceType: m1.small
---
Application: test
ShortName: tt
KeyName: keyname1
live: False
environments:
    stage:
        python: True
        java: True
        node[1]:
            ident: node1
        node[2,3,4]:
            ident: node234
        node:
            ident: default
    production:
        cloudadmin:
            template: cloudadmin.js
            InstanceType: m1.small
        python:
            template: python.js
            AvailabilityZones: us-east-1a,us-east-1b,us-east-1c
            WebServerCapacity: 3
            InstanceType: c1.medium
---
Application: liveapp
ShortName: la
model: appmodel
live: true
environments:
    production:
        python:
            WebServerCapacity: 6
"#;

const TEMPLATE: &str = r#"{
    "AWSTemplateFormatVersion": "2010-09-09",
    "Description": "Python stack",
    "Parameters": {
        "KeyName": {"Type": "String"},
        "InstanceType": {"Type": "String"},
        "WebServerCapacity": {"Type": "Number"},
        "Environment": {"Type": "String"}
    },
    "Resources": {}
}"#;

fn load(dir: &TempDir) -> Applications {
    let path = dir.path().join("applications.yml");
    fs::write(&path, SETTINGS).unwrap();
    Applications::load_from_file(&path).unwrap()
}

fn resolve(apps: &Applications, stack_name: &str) -> Result<PropertyMap, ApplicationError> {
    apps.get_by_stack_name(stack_name)?.stack_info_from_stack_name(stack_name)
}

#[test]
fn test_resolve_full_stack_info() {
    let dir = TempDir::new().unwrap();
    let apps = load(&dir);

    let info = resolve(&apps, "tt-python-production").unwrap();

    let mut expected = PropertyMap::new();
    for (key, value) in [
        ("Application", "test"),
        ("ShortName", "tt"),
        ("KeyName", "keyname1"),
        ("Environment", "production"),
        ("Type", "python"),
        ("template", "python.js"),
        ("AvailabilityZones", "us-east-1a,us-east-1b,us-east-1c"),
        ("InstanceType", "c1.medium"),
    ] {
        expected.insert(key.to_string(), PropertyValue::from(value));
    }
    expected.insert("live".to_string(), PropertyValue::Bool(false));
    expected.insert("WebServerCapacity".to_string(), PropertyValue::from(3));

    assert_eq!(info, expected);
}

#[test]
fn test_resolve_identifiers() {
    let dir = TempDir::new().unwrap();
    let apps = load(&dir);

    let ident = |stack_name: &str| -> String {
        let info = resolve(&apps, stack_name).unwrap();
        info["ident"].as_str().unwrap().to_string()
    };

    assert_eq!(ident("tt-node-stage-1"), "node1");
    for id in ["2", "3", "4"] {
        assert_eq!(ident(&format!("tt-node-stage-{}", id)), "node234");
    }
    assert_eq!(ident("tt-node-stage-notspecified"), "default");
    assert_eq!(ident("tt-node-stage"), "default");
}

#[test]
fn test_resolve_lookup_failures() {
    let dir = TempDir::new().unwrap();
    let apps = load(&dir);

    assert!(matches!(
        resolve(&apps, "tt-python-weirdenv"),
        Err(ApplicationError::EnvironmentNotFound(_))
    ));
    assert!(matches!(
        resolve(&apps, "tt-wrongpool-production"),
        Err(ApplicationError::PoolNotFound(_))
    ));
    assert!(matches!(
        resolve(&apps, "xx-python-production"),
        Err(ApplicationError::NotFound(_))
    ));

    let test = apps.get_by_name("test").unwrap();
    assert!(matches!(
        test.stack_info_from_stack_name("xx-python-production"),
        Err(ApplicationError::WrongApplication { .. })
    ));
}

#[test]
fn test_model_inheritance_and_live_guard() {
    let dir = TempDir::new().unwrap();
    let apps = load(&dir);

    let info = resolve(&apps, "la-python-production").unwrap();

    assert_eq!(info["KeyName"], PropertyValue::from("keymodel"));
    assert_eq!(info["InstanceType"], PropertyValue::from("m1.small"));
    assert_eq!(info["WebServerCapacity"], PropertyValue::from(6));
    assert_eq!(info["Application"], PropertyValue::from("liveapp"));
    assert!(is_live_production(&info));
    assert!(!is_live_production(&resolve(&apps, "tt-python-production").unwrap()));
}

#[test]
fn test_template_parameters_from_resolution() {
    let dir = TempDir::new().unwrap();
    let apps = load(&dir);
    fs::write(dir.path().join("python.js"), TEMPLATE).unwrap();

    let info = resolve(&apps, "tt-python-production").unwrap();
    let path = resolve_template_path(dir.path(), None, &info).unwrap();
    let template = CfnTemplate::load(&path).unwrap();
    let parameters = CfnParameters::from_stack_info(&template, &info);

    assert_eq!(
        parameters.to_string(),
        " Environment = production\n InstanceType = c1.medium\n KeyName = keyname1\n WebServerCapacity = 3"
    );
}

#[test]
fn test_missing_settings_file() {
    let err = Applications::load_from_file("/nonexistent/applications.yml").unwrap_err();
    assert!(matches!(err, AwsToolsError::Io(_)));
}
