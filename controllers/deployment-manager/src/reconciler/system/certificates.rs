//! Certificates, platform root CAs and the licence
//!
//! Certificates and licences cannot be removed from the platform once
//! installed, so these steps only ever add or replace content.

use crate::config::names;
use crate::error::{ControllerError, Result};
use crate::events::{self, REASON_CREATED, REASON_DEPENDENCY};
use crate::reconciler::Reconciler;
use crds::{
    CERT_PLATFORM, SECRET_CA_CERT_KEY, SECRET_CERT_KEY, SECRET_LICENSE_CONTENT_KEY, SECRET_PRIVATE_KEY_KEY, System,
    SystemSpec,
};
use kube::ResourceExt;
use platform_client::{PlatformClientTrait, SystemRecord};
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Reads of a platform certificate secret before giving up on its CA
const CA_POLL_ATTEMPTS: u32 = 3;
const CA_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Signature the platform reports for an installed certificate: the
/// certificate type followed by the decimal serial number.
///
/// # Errors
///
/// Returns `UserData` when `pem` does not hold a parsable certificate.
pub(crate) fn certificate_signature(cert_type: &str, secret: &str, pem: &[u8]) -> Result<String> {
    let (_, block) = x509_parser::pem::parse_x509_pem(pem).map_err(|e| {
        ControllerError::UserData(format!("unexpected certificate contents in secret {}: {}", secret, e))
    })?;
    let certificate = block
        .parse_x509()
        .map_err(|e| ControllerError::UserData(format!("corrupt certificate contents in secret {}: {}", secret, e)))?;
    Ok(format!("{}_{}", cert_type, certificate.tbs_certificate.serial))
}

/// Write `contents` readable by the owner only. Returns `false` when the
/// file already holds them.
async fn write_ca_file(path: &Path, contents: &[u8]) -> Result<bool> {
    if tokio::fs::read(path).await.is_ok_and(|current| current == contents) {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(contents).await?;
    file.flush().await?;
    Ok(true)
}

impl Reconciler {
    /// Save the CA of every platform certificate under the CA directory and
    /// return them as trust anchors for the platform client.
    pub(crate) async fn install_root_certificates(&self, system: &System) -> Result<Vec<Vec<u8>>> {
        let namespace = system.namespace().unwrap_or_default();
        let mut anchors = Vec::new();

        for cert in system
            .spec
            .certificates
            .iter()
            .flatten()
            .filter(|c| c.cert_type == CERT_PLATFORM)
        {
            let Some(ca) = self.platform_ca(&namespace, &cert.secret).await? else {
                warn!("Continuing without a CA certificate from secret {}/{}", namespace, cert.secret);
                continue;
            };

            let filename = format!("{}-{}-ca-cert.pem", namespace, cert.secret);
            if write_ca_file(&self.ca_dir.join(&filename), &ca).await? {
                info!("Root certificate from {} saved as {}", cert.secret, filename);
                events::normal(
                    self.store(),
                    system,
                    REASON_CREATED,
                    format!("root certificate saved as file: {}", filename),
                )
                .await;
            }
            anchors.push(ca);
        }
        Ok(anchors)
    }

    /// `ca.crt` of a platform certificate secret. The key is written by the
    /// certificate issuer after the secret appears, so it is polled briefly.
    async fn platform_ca(&self, namespace: &str, secret: &str) -> Result<Option<Vec<u8>>> {
        for attempt in 1..=CA_POLL_ATTEMPTS {
            let Some(data) = self.store.get_secret(namespace, secret).await? else {
                debug!("Platform certificate secret {}/{} not found", namespace, secret);
                return Ok(None);
            };
            if let Some(ca) = data.get(SECRET_CA_CERT_KEY) {
                return Ok(Some(ca.clone()));
            }

            info!(
                "Platform certificate CA not ready in {} (attempt {}/{})",
                secret, attempt, CA_POLL_ATTEMPTS
            );
            if attempt < CA_POLL_ATTEMPTS {
                tokio::time::sleep(CA_POLL_INTERVAL).await;
            }
        }
        Ok(None)
    }

    /// Refuse to send private keys unless the platform and the client both
    /// use HTTPS.
    fn private_key_transmission_allowed(&self, client: &dyn PlatformClientTrait, record: &SystemRecord) -> Result<()> {
        if !self.config.https_required(names::SYSTEM_CERTIFICATE) {
            info!("Allowing certificates to be installed over HTTP");
            return Ok(());
        }
        if !record.capabilities.https_enabled {
            return Err(ControllerError::SystemDependency(
                "it is unsafe to install certificates while HTTPS is disabled".to_string(),
            ));
        }
        if !client.is_https() {
            return Err(ControllerError::HttpsClientRequired(
                "it is unsafe to install certificates thru a non HTTPS URL".to_string(),
            ));
        }
        Ok(())
    }

    /// Install every listed certificate whose signature is not yet present.
    pub(crate) async fn reconcile_certificates(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
        record: &SystemRecord,
    ) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_CERTIFICATE) {
            return Ok(());
        }
        let Some(certificates) = spec.certificates.as_ref() else {
            return Ok(());
        };

        let namespace = system.namespace().unwrap_or_default();
        let installed = client.list_certificates().await?;

        for cert in certificates {
            let Some(data) = self.store.get_secret(&namespace, &cert.secret).await? else {
                // Installed outside of the manager
                events::warning(
                    self.store(),
                    system,
                    REASON_DEPENDENCY,
                    format!("skipping {:?} certificate {:?} from system", cert.cert_type, cert.secret),
                )
                .await;
                continue;
            };

            let mut pem = data.get(SECRET_CERT_KEY).cloned().ok_or_else(|| {
                ControllerError::UserData(format!(
                    "missing {:?} key in certificate secret {}",
                    SECRET_CERT_KEY, cert.secret
                ))
            })?;
            let signature = certificate_signature(&cert.cert_type, &cert.secret, &pem)?;
            if installed.iter().any(|c| c.signature == signature) {
                debug!("Certificate {} already installed", signature);
                continue;
            }

            if cert.private_key_expected() {
                self.private_key_transmission_allowed(client, record)?;
                let key = data.get(SECRET_PRIVATE_KEY_KEY).ok_or_else(|| {
                    ControllerError::UserData(format!(
                        "missing {:?} key in certificate secret {}",
                        SECRET_PRIVATE_KEY_KEY, cert.secret
                    ))
                })?;
                pem.extend_from_slice(key);
            }

            info!("Installing certificate {}", signature);
            client.install_certificate(&cert.cert_type, pem).await?;
            events::normal(
                self.store(),
                system,
                REASON_CREATED,
                format!("certificate {:?} has been installed", signature),
            )
            .await;
        }
        Ok(())
    }

    /// Replace the installed licence when its content differs.
    pub(crate) async fn reconcile_license(
        &self,
        client: &dyn PlatformClientTrait,
        system: &System,
        spec: &SystemSpec,
    ) -> Result<()> {
        if !self.config.is_enabled(names::SYSTEM_LICENSE) {
            return Ok(());
        }
        let Some(license) = spec.license.as_ref() else {
            return Ok(());
        };

        let data = self.secret(system, &license.secret).await?;
        let content = data.get(SECRET_LICENSE_CONTENT_KEY).ok_or_else(|| {
            ControllerError::UserData(format!(
                "missing {:?} key in licence secret {}",
                SECRET_LICENSE_CONTENT_KEY, license.secret
            ))
        })?;

        let current = match client.get_license().await {
            Ok(current) => Some(current.content),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        if current.as_deref().map(str::as_bytes) == Some(content.as_slice()) {
            return Ok(());
        }

        info!("Installing licence from secret {} ({} bytes)", license.secret, content.len());
        client.install_license(content.clone()).await?;
        events::normal(self.store(), system, REASON_CREATED, "license has been installed").await;
        Ok(())
    }
}
