use crate::config::ProvisionOptions;
use crate::error::{IngestError, StoreError};
use crate::store::{TableSpec, TableStatus};
use crate::traits::ChunkStore;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionState {
    Absent,
    Creating,
    Ready,
}

/// One creation attempt, awaited by every caller that arrives while it runs.
/// Resolves to the failure details on error.
type Attempt = Shared<BoxFuture<'static, Result<(), String>>>;

enum Slot {
    Creating { generation: u64, attempt: Attempt },
    Ready,
}

#[derive(Default)]
struct Slots {
    tables: HashMap<String, Slot>,
    next_generation: u64,
}

/// Makes sure destination tables exist before any chunk is written.
///
/// Each table name is provisioned at most once per provisioner: concurrent
/// callers share a single in-flight creation and all observe its result,
/// success or failure. A failed attempt leaves the table `Absent` so a later
/// call can try again.
pub struct TableProvisioner {
    store: Arc<dyn ChunkStore>,
    options: ProvisionOptions,
    slots: Mutex<Slots>,
}

impl TableProvisioner {
    pub fn new(store: Arc<dyn ChunkStore>, options: ProvisionOptions) -> Self {
        Self {
            store,
            options,
            slots: Mutex::new(Slots::default()),
        }
    }

    pub fn state(&self, table: &str) -> ProvisionState {
        match lock(&self.slots).tables.get(table) {
            Some(Slot::Ready) => ProvisionState::Ready,
            Some(Slot::Creating { .. }) => ProvisionState::Creating,
            None => ProvisionState::Absent,
        }
    }

    pub async fn ensure_table(&self, spec: &TableSpec) -> Result<ProvisionState, IngestError> {
        let (generation, attempt) = {
            let mut guard = lock(&self.slots);
            let slots = &mut *guard;
            match slots.tables.get(&spec.name) {
                Some(Slot::Ready) => return Ok(ProvisionState::Ready),
                Some(Slot::Creating {
                    generation,
                    attempt,
                }) => (*generation, attempt.clone()),
                None => {
                    let generation = slots.next_generation;
                    slots.next_generation += 1;
                    let attempt =
                        provision(self.store.clone(), self.options, spec.clone())
                            .boxed()
                            .shared();
                    slots.tables.insert(
                        spec.name.clone(),
                        Slot::Creating {
                            generation,
                            attempt: attempt.clone(),
                        },
                    );
                    (generation, attempt)
                }
            }
        };

        let result = attempt.await;

        let mut slots = lock(&self.slots);
        match result {
            Ok(()) => {
                slots.tables.insert(spec.name.clone(), Slot::Ready);
                Ok(ProvisionState::Ready)
            }
            Err(details) => {
                // a newer attempt started by a later caller stays in place
                if matches!(
                    slots.tables.get(&spec.name),
                    Some(Slot::Creating { generation: current, .. }) if *current == generation
                ) {
                    slots.tables.remove(&spec.name);
                }
                Err(IngestError::Provisioning {
                    table: spec.name.clone(),
                    details,
                })
            }
        }
    }
}

async fn provision(
    store: Arc<dyn ChunkStore>,
    options: ProvisionOptions,
    spec: TableSpec,
) -> Result<(), String> {
    let result = match store.create_table(&spec).await {
        Ok(()) => {
            info!(table = %spec.name, "create_table issued, waiting for table to become active");
            wait_until_active(store.as_ref(), options, &spec.name).await
        }
        Err(StoreError::TableAlreadyExists(_)) => {
            info!(table = %spec.name, "table already exists");
            wait_until_active(store.as_ref(), options, &spec.name).await
        }
        Err(other) => Err(other.to_string()),
    };

    match &result {
        Ok(()) => info!(table = %spec.name, "table ready"),
        Err(details) => error!(table = %spec.name, error = %details, "table provisioning failed"),
    }

    result
}

async fn wait_until_active(
    store: &dyn ChunkStore,
    options: ProvisionOptions,
    table: &str,
) -> Result<(), String> {
    let poll = async {
        loop {
            match store.table_status(table).await {
                Ok(status) if status.accepts_writes() => return Ok(()),
                Ok(TableStatus::Creating) | Ok(TableStatus::Missing) => {
                    debug!(table, "table not active yet");
                }
                Ok(status) => {
                    return Err(format!("table entered unexpected status {status}"));
                }
                Err(failure) => return Err(failure.to_string()),
            }
            tokio::time::sleep(options.poll_interval).await;
        }
    };

    tokio::time::timeout(options.timeout, poll)
        .await
        .map_err(|_| {
            format!(
                "table did not become active within {:?}",
                options.timeout
            )
        })?
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
