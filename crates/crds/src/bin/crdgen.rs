//! Print every deployment manager CRD as a multi-document YAML stream.

use crds::{DataNetwork, Host, HostProfile, PlatformNetwork, PtpInstance, PtpInterface, System};
use kube::core::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [
        System::crd(),
        PlatformNetwork::crd(),
        DataNetwork::crd(),
        HostProfile::crd(),
        Host::crd(),
        PtpInstance::crd(),
        PtpInterface::crd(),
    ];

    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
