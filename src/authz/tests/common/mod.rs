//! Shared fixtures for the warden-authz integration tests

#![allow(dead_code)]

use serde::Serialize;
use std::collections::BTreeMap;
use warden_authz::{serde_field, HostValue, Instance, PolarError, PolarObject, Warden, WardenConfig};

#[derive(Debug, Clone, Serialize)]
pub struct Grant {
    pub org: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct User {
    pub name: String,
    pub grants: Vec<Grant>,
}

impl User {
    pub fn new(name: &str, grants: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            grants: grants
                .iter()
                .map(|(org, role)| Grant {
                    org: org.to_string(),
                    role: role.to_string(),
                })
                .collect(),
        }
    }
}

impl PolarObject for User {
    fn get_field(&self, name: &str) -> Option<HostValue> {
        serde_field(self, name)
    }
}

#[derive(Debug, Serialize)]
pub struct Org {
    pub name: String,
}

impl PolarObject for Org {
    fn get_field(&self, name: &str) -> Option<HostValue> {
        serde_field(self, name)
    }
}

/// Repository owned by an organization; `org` hands back the shared instance
#[derive(Debug)]
pub struct Repo {
    pub name: String,
    pub org: Instance,
}

impl PolarObject for Repo {
    fn get_field(&self, name: &str) -> Option<HostValue> {
        match name {
            "name" => Some(HostValue::from(self.name.as_str())),
            "org" => Some(HostValue::Instance(self.org.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Widget {
    pub id: i64,
}

impl PolarObject for Widget {
    fn get_field(&self, name: &str) -> Option<HostValue> {
        serde_field(self, name)
    }
}

pub fn build_widget(fields: BTreeMap<String, HostValue>) -> Result<Widget, PolarError> {
    let id = fields
        .get("id")
        .and_then(HostValue::as_i64)
        .ok_or_else(|| PolarError::Runtime("Widget requires an integer id".to_string()))?;
    Ok(Widget { id })
}

pub fn roles_warden() -> Warden {
    let config = WardenConfig {
        enable_roles: true,
        ..WardenConfig::default()
    };
    let warden = Warden::with_config(config).unwrap();
    warden.register_class::<User>("User").unwrap();
    warden.register_class::<Org>("Org").unwrap();
    warden.register_class::<Repo>("Repo").unwrap();
    warden
}

/// All values bound to `var` across the query's solutions
pub fn collect_var(warden: &Warden, goal: &str, var: &str) -> Vec<HostValue> {
    warden
        .query(goal)
        .unwrap()
        .results()
        .map(|bindings| bindings.unwrap().get(var).cloned().unwrap())
        .collect()
}

pub fn write_policy(dir: &std::path::Path, file: &str, text: &str) -> std::path::PathBuf {
    let path = dir.join(file);
    std::fs::write(&path, text).unwrap();
    path
}
