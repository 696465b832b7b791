//! Renders the operator's CRD manifests as a multi-document YAML stream.
//!
//! Usage: `cargo run --bin crdgen > config/crds.yaml`

use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&crds::SentinelAgent::crd())?);
    println!("---");
    print!("{}", serde_yaml::to_string(&crds::CanaryDaemonSet::crd())?);
    Ok(())
}
