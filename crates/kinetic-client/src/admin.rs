//! Administrative convenience wrappers.
//!
//! Erase, lock, PIN management, cluster versioning, ACL installation,
//! firmware, and drive logs. Each wrapper is one builder call plus execute.
//! PIN-carrying operations validate TLS first and return `SslRequired`
//! before any PIN inspection; the submission path re-checks the gate as a
//! backstop before the socket is touched.

use std::path::Path;

use bytes::Bytes;
use kinetic_proto::LogType;

use crate::{
    acl,
    builder,
    error::{KineticError, Result},
    operation::Response,
    session::Session,
};

impl Session {
    /// TLS gate for PIN-carrying admin operations, checked before PIN
    /// validation or command construction.
    fn ensure_ssl_enabled(&self) -> Result<()> {
        if self.config().use_ssl {
            Ok(())
        } else {
            Err(KineticError::SslRequired)
        }
    }

    /// Change the drive's erase PIN.
    pub async fn set_erase_pin(
        &self,
        old_pin: Option<Bytes>,
        new_pin: Option<Bytes>,
    ) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::set_pin(old_pin.as_ref(), new_pin.as_ref(), false)?)
            .await
            .map(drop)
    }

    /// Change the drive's lock PIN.
    pub async fn set_lock_pin(
        &self,
        old_pin: Option<Bytes>,
        new_pin: Option<Bytes>,
    ) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::set_pin(old_pin.as_ref(), new_pin.as_ref(), true)?)
            .await
            .map(drop)
    }

    /// Erase all drive contents with a full overwrite.
    pub async fn secure_erase(&self, pin: Option<Bytes>) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::erase(true, pin.as_ref())?).await.map(drop)
    }

    /// Erase all drive contents by discarding the media encryption key.
    pub async fn instant_erase(&self, pin: Option<Bytes>) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::erase(false, pin.as_ref())?).await.map(drop)
    }

    /// Lock the drive.
    pub async fn lock_device(&self, pin: Option<Bytes>) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::lock(true, pin.as_ref())?).await.map(drop)
    }

    /// Unlock the drive.
    pub async fn unlock_device(&self, pin: Option<Bytes>) -> Result<()> {
        self.ensure_ssl_enabled()?;
        self.execute(builder::lock(false, pin.as_ref())?).await.map(drop)
    }

    /// Read standard drive log sections.
    pub async fn get_log(&self, types: &[LogType]) -> Result<Response> {
        self.execute(builder::get_log(types)?).await
    }

    /// Read a vendor-specific device log by name. TLS only.
    pub async fn get_device_specific_log(&self, name: Bytes) -> Result<Response> {
        self.execute(builder::get_device_log(name)).await
    }

    /// Install a new cluster version on the drive.
    pub async fn set_cluster_version(&self, version: i64) -> Result<()> {
        self.execute(builder::set_cluster_version(version)).await.map(drop)
    }

    /// Load ACL definitions from a JSON file and install them.
    ///
    /// The loaded definitions are owned by the operation and dropped once it
    /// resolves.
    pub async fn set_acl(&self, path: &Path) -> Result<()> {
        let acls = acl::load_acl_file(path)?;
        self.execute(builder::set_acl(acls)).await.map(drop)
    }

    /// Read a firmware image from disk and send it to the drive.
    pub async fn update_firmware(&self, path: &Path) -> Result<()> {
        self.execute(builder::update_firmware(path)?).await.map(drop)
    }
}
