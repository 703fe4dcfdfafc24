//! Postgres 机器目录（只读）

use crate::error::StorageError;
use crate::models::{DepartmentRecord, MachineRecord};
use crate::traits::MachineCatalog;
use sqlx::{PgPool, Row};

pub struct PgMachineCatalog {
    pub pool: PgPool,
}

impl PgMachineCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MachineCatalog for PgMachineCatalog {
    async fn find_machine(&self, machine_id: &str) -> Result<Option<MachineRecord>, StorageError> {
        let row = sqlx::query(
            "select m.machine_id, m.machine_number, m.model, m.status, m.department_id, \
             d.name as department_name \
             from machines m join departments d on d.department_id = m.department_id \
             where m.machine_id = $1",
        )
        .bind(machine_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(MachineRecord {
            machine_id: row.try_get("machine_id")?,
            machine_number: row.try_get("machine_number")?,
            model: row.try_get("model")?,
            status: row.try_get("status")?,
            department_id: row.try_get("department_id")?,
            department_name: row.try_get("department_name")?,
        }))
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, StorageError> {
        let rows = sqlx::query("select department_id, name from departments order by department_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(DepartmentRecord {
                    department_id: row.try_get("department_id")?,
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }
}
