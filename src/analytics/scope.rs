use crate::domain::filters::{DepartmentFilter, ALL_DEPARTMENTS};
use crate::domain::models::Employee;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

/// Employee ids a report counts against, plus the per-department groups for
/// the breakdown table. Dependent rows are matched against these sets
/// in-process rather than joined in the store.
#[derive(Debug, Clone, Default)]
pub(crate) struct EmployeeScope {
    ids: HashSet<Uuid>,
    departments: Vec<(String, HashSet<Uuid>)>,
}

impl EmployeeScope {
    pub fn resolve(employees: &[Employee], filter: &DepartmentFilter) -> Self {
        match filter {
            DepartmentFilter::All => {
                let mut groups: BTreeMap<String, HashSet<Uuid>> = BTreeMap::new();
                for employee in employees {
                    if let Some(department) = employee.department.as_deref() {
                        if department != ALL_DEPARTMENTS {
                            groups
                                .entry(department.to_string())
                                .or_default()
                                .insert(employee.id);
                        }
                    }
                }
                Self {
                    ids: employees.iter().map(|e| e.id).collect(),
                    departments: groups.into_iter().collect(),
                }
            }
            DepartmentFilter::Named(name) => {
                let ids: HashSet<Uuid> = employees
                    .iter()
                    .filter(|e| e.department.as_deref() == Some(name.as_str()))
                    .map(|e| e.id)
                    .collect();
                Self {
                    departments: vec![(name.clone(), ids.clone())],
                    ids,
                }
            }
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.ids.contains(id)
    }

    pub fn size(&self) -> u64 {
        self.ids.len() as u64
    }

    pub fn departments(&self) -> &[(String, HashSet<Uuid>)] {
        &self.departments
    }
}
