//! 机器目录内存实现
//!
//! 目录为只读数据，构造时一次性装入。

use crate::error::StorageError;
use crate::models::{DepartmentRecord, MachineRecord};
use crate::traits::MachineCatalog;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct InMemoryMachineCatalog {
    machines: BTreeMap<String, MachineRecord>,
}

impl InMemoryMachineCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_machines(machines: Vec<MachineRecord>) -> Self {
        Self {
            machines: machines
                .into_iter()
                .map(|machine| (machine.machine_id.clone(), machine))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl MachineCatalog for InMemoryMachineCatalog {
    async fn find_machine(&self, machine_id: &str) -> Result<Option<MachineRecord>, StorageError> {
        Ok(self.machines.get(machine_id).cloned())
    }

    async fn list_departments(&self) -> Result<Vec<DepartmentRecord>, StorageError> {
        let mut departments: BTreeMap<String, DepartmentRecord> = BTreeMap::new();
        for machine in self.machines.values() {
            departments
                .entry(machine.department_id.clone())
                .or_insert_with(|| DepartmentRecord {
                    department_id: machine.department_id.clone(),
                    name: machine.department_name.clone(),
                });
        }
        Ok(departments.into_values().collect())
    }
}
