//! Weave configuration and helper-symbol resolution
//!
//! The weaver needs three collaborator symbols: the wrapper type that
//! caches the latest value of a reactive source, its value accessor, and
//! the static factory that builds the wrapper. They are resolved once per
//! pass from the configuration; a missing or malformed name aborts the
//! pass before any module is touched.

use crate::error::{WeaveError, WeaveResult};
use reweave_bytecode::{AccessorKind, MethodRef, TypeRef};
use serde::Deserialize;

/// Weave pass configuration (`reweave.toml`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeaveConfig {
    /// Fully qualified name of the marker function (`Type::method`)
    pub marker: String,
    /// Fully qualified name of the wrapper type (generic over the value type)
    pub helper_type: String,
    /// Name of the wrapper's value accessor
    pub value_accessor: String,
    /// Fully qualified name of the wrapper factory (`Type::method`)
    pub factory: String,
    /// Prefix for woven helper fields
    pub field_prefix: String,
}

impl Default for WeaveConfig {
    fn default() -> Self {
        Self {
            marker: "Reactive.Observe::AsProperty".to_string(),
            helper_type: "Reactive.PropertyHelper".to_string(),
            value_accessor: "get_Value".to_string(),
            factory: "Reactive.PropertyHelperMixin::ToProperty".to_string(),
            field_prefix: "$".to_string(),
        }
    }
}

/// Collaborator symbols resolved for one weave pass
#[derive(Debug, Clone)]
pub struct HelperSymbols {
    /// Fully qualified marker function name matched at call sites
    pub marker: String,
    /// Open (uninstantiated) wrapper type
    pub helper_type: TypeRef,
    /// Wrapper value accessor (instance, no parameters)
    pub value_get: MethodRef,
    /// Wrapper factory (static, `(owner, property name, initial value, source)`)
    pub to_property: MethodRef,
}

impl HelperSymbols {
    /// Resolve all helper symbols from the configuration
    pub fn resolve(config: &WeaveConfig) -> WeaveResult<Self> {
        let (_, _) = split_qualified(&config.marker, "marker")?;
        let helper_name = require(&config.helper_type, "helper_type")?;
        let accessor_name = require(&config.value_accessor, "value_accessor")?;
        let (factory_type, factory_name) = split_qualified(&config.factory, "factory")?;

        let helper_type = TypeRef::named(helper_name);
        let value_get = MethodRef {
            declaring: helper_type.clone(),
            name: accessor_name.to_string(),
            param_count: 0,
            has_this: true,
            returns_value: true,
            type_args: Vec::new(),
            accessor: Some(AccessorKind::Get),
        };
        let to_property = MethodRef {
            declaring: TypeRef::named(factory_type),
            name: factory_name.to_string(),
            param_count: 4,
            has_this: false,
            returns_value: true,
            type_args: Vec::new(),
            accessor: None,
        };

        Ok(Self {
            marker: config.marker.clone(),
            helper_type,
            value_get,
            to_property,
        })
    }

    /// The wrapper type instantiated over a concrete value type
    pub fn helper_field_type(&self, value_type: &TypeRef) -> TypeRef {
        self.helper_type.instantiate(vec![value_type.clone()])
    }

    /// The value accessor bound to a concrete value type
    pub fn value_get_for(&self, value_type: &TypeRef) -> MethodRef {
        let mut method = self.value_get.clone();
        method.declaring = self.helper_field_type(value_type);
        method.type_args = vec![value_type.clone()];
        method
    }

    /// The factory bound to a concrete owner and value type
    pub fn to_property_for(&self, owner: &TypeRef, value_type: &TypeRef) -> MethodRef {
        let mut method = self.to_property.clone();
        method.type_args = vec![owner.clone(), value_type.clone()];
        method
    }
}

fn require<'a>(value: &'a str, key: &str) -> WeaveResult<&'a str> {
    if value.is_empty() {
        return Err(WeaveError::Config(format!("`{key}` must not be empty")));
    }
    Ok(value)
}

fn split_qualified<'a>(value: &'a str, key: &str) -> WeaveResult<(&'a str, &'a str)> {
    require(value, key)?;
    value
        .rsplit_once("::")
        .filter(|(ty, name)| !ty.is_empty() && !name.is_empty())
        .ok_or_else(|| {
            WeaveError::Config(format!(
                "`{key}` must be a fully qualified `Type::method` name, got `{value}`"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_resolves() {
        let symbols = HelperSymbols::resolve(&WeaveConfig::default()).unwrap();
        assert_eq!(symbols.marker, "Reactive.Observe::AsProperty");
        assert_eq!(symbols.helper_type.full_name, "Reactive.PropertyHelper");
        assert_eq!(symbols.value_get.name, "get_Value");
        assert!(symbols.value_get.has_this);
        assert_eq!(symbols.to_property.name, "ToProperty");
        assert_eq!(symbols.to_property.param_count, 4);
        assert!(!symbols.to_property.has_this);
    }

    #[test]
    fn test_missing_symbol_is_fatal() {
        let config = WeaveConfig {
            helper_type: String::new(),
            ..WeaveConfig::default()
        };
        assert!(matches!(
            HelperSymbols::resolve(&config),
            Err(WeaveError::Config(_))
        ));
    }

    #[test]
    fn test_unqualified_factory_rejected() {
        let config = WeaveConfig {
            factory: "ToProperty".to_string(),
            ..WeaveConfig::default()
        };
        assert!(matches!(
            HelperSymbols::resolve(&config),
            Err(WeaveError::Config(_))
        ));
    }

    #[test]
    fn test_instantiation_uses_one_value_type() {
        let symbols = HelperSymbols::resolve(&WeaveConfig::default()).unwrap();
        let owner = TypeRef::named("App.ViewModel");
        let value = TypeRef::named("Double");

        let field_type = symbols.helper_field_type(&value);
        assert_eq!(field_type.type_args, vec![value.clone()]);

        let accessor = symbols.value_get_for(&value);
        assert_eq!(accessor.declaring, field_type);
        assert_eq!(accessor.type_args, vec![value.clone()]);

        let factory = symbols.to_property_for(&owner, &value);
        assert_eq!(factory.type_args, vec![owner, value]);
    }
}
