//! [`ReplicaProvisioner`] builds (or rebuilds) one teacher's replica.
//!
//! Order of operations:
//!
//! 1. load the teacher and their sections from the central store;
//! 2. sandbox the destination (no filesystem mutation before this passes);
//! 3. translate the slice (no mutation before this succeeds either);
//! 4. refuse a destination that holds another teacher's replica;
//! 5. copy the bundle on the blocking pool;
//! 6. create the replica database and write the slice in one transaction.
//!
//! A manifest is returned only once step 6 has committed.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use roster_core::{
  store::CentralStore,
  translate::{section_to_replica, student_to_replica, user_to_replica},
};

use crate::{
  Error, Result,
  bundle::{Exclusions, copy_bundle},
  sandbox::PathSandbox,
  schema::DEFAULT_CENTRAL_SERVER_URL,
  store::ReplicaStore,
};

/// File name of the replica database inside a destination.
pub const REPLICA_DB_FILE: &str = "attendance-local.db";

/// Where replicas come from and where they go.
#[derive(Debug, Clone)]
pub struct ProvisionConfig {
  /// Every replica destination lives strictly below this directory.
  pub instances_root:     PathBuf,
  /// The deployable application bundle copied into each replica.
  pub bundle_dir:         PathBuf,
  /// The central database file, never copied.
  pub central_db_path:    Option<PathBuf>,
  /// Written into the replica's `User.centralServerUrl`.
  pub central_server_url: String,
}

impl ProvisionConfig {
  pub fn new(instances_root: impl Into<PathBuf>, bundle_dir: impl Into<PathBuf>) -> Self {
    Self {
      instances_root:     instances_root.into(),
      bundle_dir:         bundle_dir.into(),
      central_db_path:    None,
      central_server_url: DEFAULT_CENTRAL_SERVER_URL.to_owned(),
    }
  }
}

/// Result of a successful provisioning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaManifest {
  pub path:          PathBuf,
  pub section_count: usize,
  pub student_count: usize,
}

/// Builds teacher replicas from a [`CentralStore`].
pub struct ReplicaProvisioner<S> {
  store:   Arc<S>,
  config:  ProvisionConfig,
  sandbox: PathSandbox,
}

impl<S> ReplicaProvisioner<S>
where
  S: CentralStore,
{
  pub fn new(store: Arc<S>, config: ProvisionConfig) -> Self {
    let sandbox = PathSandbox::new(config.instances_root.clone());
    Self { store, config, sandbox }
  }

  pub fn config(&self) -> &ProvisionConfig { &self.config }

  /// Build or rebuild the replica for `teacher_id`.
  pub async fn provision(&self, teacher_id: &str) -> Result<ReplicaManifest> {
    let teacher = self
      .store
      .get_teacher(teacher_id)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?
      .ok_or_else(|| Error::TeacherNotFound(teacher_id.to_owned()))?;

    if teacher.sections.is_empty() {
      return Err(Error::NoSectionsAssigned(teacher.id));
    }

    let dest = self.sandbox.destination_for(&teacher.username)?;

    let section_ids = teacher.section_ids();
    let sections = self
      .store
      .sections_by_ids(&section_ids)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
    let students = self
      .store
      .students_in_sections(&section_ids)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;

    let user = user_to_replica(&teacher, &self.config.central_server_url);
    let replica_sections: Vec<_> = sections.iter().map(section_to_replica).collect();
    let replica_students = students
      .iter()
      .map(student_to_replica)
      .collect::<roster_core::Result<Vec<_>>>()?;

    // Sanitising is lossy, so two usernames can share a destination.
    let db_path = dest.join(REPLICA_DB_FILE);
    if db_path.is_file() {
      let existing = ReplicaStore::open(&db_path).await?;
      if let Some(owner) = existing.user().await?.filter(|u| u.id != teacher.id) {
        tracing::warn!(
          owner = %owner.id,
          teacher_id = %teacher.id,
          dest = %dest.display(),
          "destination holds another teacher's replica"
        );
        return Err(Error::ForeignReplica { owner: owner.id, teacher: teacher.id });
      }
    }

    let stats = {
      let exclusions = Exclusions {
        dirs:      vec![self.config.instances_root.clone()],
        databases: self.config.central_db_path.iter().cloned().collect(),
      };
      let root   = self.config.instances_root.clone();
      let bundle = self.config.bundle_dir.clone();
      let dest   = dest.clone();
      tokio::task::spawn_blocking(move || {
        std::fs::create_dir_all(&root).map_err(|e| Error::io(&root, e))?;
        copy_bundle(&bundle, &dest, &exclusions.resolved()?)
      })
      .await??
    };
    tracing::debug!(
      files = stats.files,
      dirs = stats.dirs,
      skipped = stats.skipped,
      dest = %dest.display(),
      "bundle copied"
    );

    let replica = ReplicaStore::open(&db_path).await?;
    let manifest = ReplicaManifest {
      path:          dest,
      section_count: replica_sections.len(),
      student_count: replica_students.len(),
    };
    replica.write_slice(user, replica_sections, replica_students).await?;
    replica
      .log(
        "provision",
        serde_json::json!({
          "sections": manifest.section_count,
          "students": manifest.student_count,
        }),
      )
      .await?;

    tracing::info!(
      teacher_id = %teacher.id,
      path = %manifest.path.display(),
      sections = manifest.section_count,
      students = manifest.student_count,
      "replica provisioned"
    );
    Ok(manifest)
  }
}
