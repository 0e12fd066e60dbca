//! Component namespace mapping shared by all deployers.

/// Namespace a component deploys into. The table is closed; unknown
/// components land in `default`.
pub fn namespace_for_component(component_name: &str) -> &'static str {
    match component_name {
        "gpu-operator" => "gpu-operator",
        "network-operator" => "network-operator",
        "cert-manager" => "cert-manager",
        "nvsentinel" => "nvsentinel",
        "skyhook" => "skyhook",
        _ => "default",
    }
}
