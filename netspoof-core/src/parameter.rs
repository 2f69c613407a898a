//! Module parameters
//!
//! Every module declares the parameters it reads with a [`ParamDescriptor`].
//! Values are kept as strings in a shared [`Parameters`] store, validated
//! against the declared type when set and converted by the typed getters
//! when a module configures itself.

use crate::{Error, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;

/// Parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    /// Free-form string
    String,
    /// Boolean flag
    Bool,
    /// Unsigned decimal integer
    U32,
    /// IPv4 or IPv6 address
    IpAddr,
    /// Comma separated list
    List,
}

impl ParameterType {
    /// Check that `value` is acceptable for this type
    pub fn validate(&self, name: &str, value: &str) -> Result<()> {
        match self {
            ParameterType::String | ParameterType::List => Ok(()),
            ParameterType::Bool => parse_bool(value)
                .map(|_| ())
                .ok_or_else(|| Error::invalid_parameter(name, format!("'{}' is not a boolean", value))),
            ParameterType::U32 => {
                // Digits only; no sign, no whitespace.
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::invalid_parameter(
                        name,
                        format!("'{}' is not an unsigned number", value),
                    ));
                }
                value.parse::<u32>().map(|_| ()).map_err(|e| {
                    Error::invalid_parameter(name, format!("'{}': {}", value, e))
                })
            }
            ParameterType::IpAddr => value.parse::<IpAddr>().map(|_| ()).map_err(|_| {
                Error::invalid_parameter(name, format!("'{}' is not an IP address", value))
            }),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Declaration of a parameter
#[derive(Debug, Clone)]
pub struct ParamDescriptor {
    pub name: String,
    pub description: String,
    pub param_type: ParameterType,
    pub default: String,
}

impl ParamDescriptor {
    pub fn new<S: Into<String>>(name: S, param_type: ParameterType) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            param_type,
            default: String::new(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default<S: Into<String>>(mut self, default: S) -> Self {
        self.default = default.into();
        self
    }
}

/// Shared parameter store
#[derive(Default)]
pub struct Parameters {
    descriptors: RwLock<BTreeMap<String, ParamDescriptor>>,
    values: RwLock<HashMap<String, String>>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter. Re-declaring replaces the descriptor and keeps
    /// any value already set.
    pub fn register(&self, descriptor: ParamDescriptor) {
        self.descriptors
            .write()
            .insert(descriptor.name.clone(), descriptor);
    }

    /// All declared parameters, sorted by name
    pub fn descriptors(&self) -> Vec<ParamDescriptor> {
        self.descriptors.read().values().cloned().collect()
    }

    /// Set a parameter after validating it against its declared type
    pub fn set(&self, name: &str, value: &str) -> Result<()> {
        let param_type = self
            .descriptors
            .read()
            .get(name)
            .map(|d| d.param_type)
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))?;

        let value = value.trim();
        param_type.validate(name, value)?;
        self.values.write().insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Drop an explicitly set value so the default applies again
    pub fn unset(&self, name: &str) {
        self.values.write().remove(name);
    }

    /// Raw value, falling back to the declared default
    pub fn get(&self, name: &str) -> Result<String> {
        if let Some(value) = self.values.read().get(name) {
            return Ok(value.clone());
        }
        self.descriptors
            .read()
            .get(name)
            .map(|d| d.default.clone())
            .ok_or_else(|| Error::UnknownParameter(name.to_string()))
    }

    pub fn string(&self, name: &str) -> Result<String> {
        self.get(name)
    }

    pub fn bool(&self, name: &str) -> Result<bool> {
        let value = self.get(name)?;
        if value.is_empty() {
            return Ok(false);
        }
        parse_bool(&value)
            .ok_or_else(|| Error::invalid_parameter(name, format!("'{}' is not a boolean", value)))
    }

    pub fn u32(&self, name: &str) -> Result<u32> {
        let value = self.get(name)?;
        ParameterType::U32.validate(name, &value)?;
        value
            .parse()
            .map_err(|_| Error::invalid_parameter(name, format!("'{}' is not a number", value)))
    }

    pub fn ip(&self, name: &str) -> Result<IpAddr> {
        let value = self.get(name)?;
        value.parse().map_err(|_| {
            Error::invalid_parameter(name, format!("'{}' is not an IP address", value))
        })
    }

    /// Comma separated list with whitespace trimmed and empty items dropped
    pub fn list(&self, name: &str) -> Result<Vec<String>> {
        Ok(split_list(&self.get(name)?))
    }
}

/// Split a comma separated list, trimming items and dropping empty ones
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
