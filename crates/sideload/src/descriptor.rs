use std::collections::BTreeMap;

use serde::Serialize;

use crate::environment::HostEnvironment;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LaunchMode {
    Standard,
    SingleTop,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    Unspecified,
    Portrait,
    Landscape,
}

/// Minimal component metadata built only to feed full attachment.
///
/// `parent_name` is always `None`, set explicitly: some guest runtimes
/// dereference it during full attachment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyntheticDescriptor {
    pub package_name: String,
    pub name: String,
    pub process_name: String,
    pub task_affinity: String,
    pub parent_name: Option<String>,
    pub theme: u32,
    pub launch_mode: LaunchMode,
    pub orientation: Orientation,
}

impl SyntheticDescriptor {
    pub fn for_component(env: &HostEnvironment, type_name: &str) -> Self {
        let package_name = env.package_name().to_string();
        Self {
            task_affinity: package_name.clone(),
            process_name: env.application_scope().process_name.clone(),
            package_name,
            name: type_name.to_string(),
            parent_name: None,
            theme: 0,
            launch_mode: LaunchMode::SingleTop,
            orientation: Orientation::Unspecified,
        }
    }
}

/// Empty launch request addressed at the synthesized component.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RequestPlaceholder {
    pub package_name: String,
    pub component: String,
}

impl RequestPlaceholder {
    pub fn addressed_to(descriptor: &SyntheticDescriptor) -> Self {
        Self {
            package_name: descriptor.package_name.clone(),
            component: descriptor.name.clone(),
        }
    }
}

/// Saved-state value passed to the lifecycle entry method. Always empty on a
/// fresh cycle.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct InitialState {
    pub values: BTreeMap<String, String>,
}

impl InitialState {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_never_carries_a_parent() {
        let env = HostEnvironment::default();
        let descriptor = SyntheticDescriptor::for_component(&env, "demo.Greeter");

        assert_eq!(descriptor.parent_name, None);
        assert_eq!(descriptor.package_name, env.package_name());
        assert_eq!(descriptor.task_affinity, descriptor.package_name);
        assert_eq!(descriptor.launch_mode, LaunchMode::SingleTop);
        assert_eq!(descriptor.orientation, Orientation::Unspecified);
    }

    #[test]
    fn request_targets_the_descriptor() {
        let env = HostEnvironment::default();
        let descriptor = SyntheticDescriptor::for_component(&env, "demo.Greeter");
        let request = RequestPlaceholder::addressed_to(&descriptor);

        assert_eq!(request.component, "demo.Greeter");
        assert_eq!(request.package_name, "dev.sideload.host");
    }
}
