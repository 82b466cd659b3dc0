use schema::{Catalog, Regulation, RegulationId};

use crate::MemoryStore;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegulationError {
    #[error("regulation name and value are required")]
    Incomplete,
    #[error("a regulation named {0:?} already exists")]
    DuplicateName(String),
    #[error("regulation {0} does not exist")]
    Unknown(RegulationId),
}

/// Regulations whose name or description contains the keyword, ignoring case
pub fn list_regulations(store: &MemoryStore, keyword: &str) -> Vec<Regulation> {
    let keyword = keyword.trim().to_lowercase();
    store
        .regulations()
        .filter(|r| {
            keyword.is_empty()
                || r.name.to_lowercase().contains(&keyword)
                || r.description.to_lowercase().contains(&keyword)
        })
        .cloned()
        .collect()
}

fn ensure_valid(
    store: &MemoryStore,
    regulation: &Regulation,
    current: Option<RegulationId>,
) -> Result<(), RegulationError> {
    if regulation.name.trim().is_empty() || regulation.value.trim().is_empty() {
        return Err(RegulationError::Incomplete);
    }

    match store.regulation_by_name(regulation.name.trim()) {
        Some(other) if Some(other.id) != current => {
            Err(RegulationError::DuplicateName(other.name.clone()))
        }
        _ => Ok(()),
    }
}

fn trimmed(regulation: Regulation) -> Regulation {
    Regulation {
        name: regulation.name.trim().to_string(),
        value: regulation.value.trim().to_string(),
        ..regulation
    }
}

pub fn create_regulation(
    store: &mut MemoryStore,
    regulation: Regulation,
) -> Result<Regulation, RegulationError> {
    ensure_valid(store, &regulation, None)?;

    let created = store.insert_regulation(trimmed(regulation));
    log::info!("created regulation {} ({})", created.id, created.name);

    Ok(created)
}

/// Regulations are edited in place and never deleted, flights keep referring to them by id
pub fn update_regulation(
    store: &mut MemoryStore,
    regulation: Regulation,
) -> Result<Regulation, RegulationError> {
    if store.regulation(regulation.id).is_none() {
        return Err(RegulationError::Unknown(regulation.id));
    }
    ensure_valid(store, &regulation, Some(regulation.id))?;

    let updated = trimmed(regulation);
    let slot = store
        .regulation_mut(updated.id)
        .ok_or(RegulationError::Unknown(updated.id))?;
    *slot = updated.clone();
    log::info!("updated regulation {} ({} = {})", updated.id, updated.name, updated.value);

    Ok(updated)
}
