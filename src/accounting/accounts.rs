use std::collections::HashMap;

use getset::Getters;

use super::ConversionError;

#[derive(Debug, Clone, PartialEq, Getters)]
#[getset(get = "pub")]
pub struct AccountNode {
    id: String,
    name: String,
    parent: Option<String>,
}

impl AccountNode {
    pub fn new(id: &str, name: &str, parent: Option<&str>) -> AccountNode {
        AccountNode {
            id: id.to_string(),
            name: name.to_string(),
            parent: parent.map(str::to_string),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Maps account ids to flattened, qualified account names.
///
/// A book root (an account without parent) never appears in a qualified name:
/// its direct children keep their bare name and deeper accounts are prefixed
/// with their parent's qualified name.
#[derive(Debug, Default)]
pub struct AccountTree {
    qualified: HashMap<String, String>,
}

impl AccountTree {
    /// Resolves every node, in document order, against the others.
    pub fn build(
        accounts: Vec<AccountNode>,
        separator: &str,
    ) -> Result<AccountTree, ConversionError> {
        let mut nodes = HashMap::with_capacity(accounts.len());
        let mut order = Vec::with_capacity(accounts.len());
        for account in accounts {
            let id = account.id.clone();
            if nodes.insert(id.clone(), account).is_some() {
                return Err(ConversionError::DuplicateAccount(id));
            }
            order.push(id);
        }

        let mut qualified = HashMap::with_capacity(nodes.len());
        for id in order {
            let name = qualify(&nodes, &qualified, &id, separator)?;
            qualified.insert(id, name);
        }

        Ok(AccountTree { qualified })
    }

    pub fn qualified_name(&self, id: &str) -> Option<&str> {
        self.qualified.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.qualified.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qualified.is_empty()
    }
}

fn qualify(
    nodes: &HashMap<String, AccountNode>,
    resolved: &HashMap<String, String>,
    id: &str,
    separator: &str,
) -> Result<String, ConversionError> {
    let mut cursor = match nodes.get(id) {
        Some(node) => node,
        None => {
            let message = format!("account `{}` was never defined", id);
            return Err(ConversionError::MalformedXml(message));
        },
    };

    if cursor.is_root() {
        return Ok(cursor.name.clone());
    }

    // Names collected leaf first, until the root or an already resolved ancestor.
    let mut names = vec![cursor.name.as_str()];
    let mut prefix = None;
    let mut depth = 0;
    while let Some(parent_id) = cursor.parent.as_deref() {
        let parent = nodes.get(parent_id).ok_or_else(|| ConversionError::UnknownParent {
            account: cursor.id.clone(),
            parent: parent_id.to_string(),
        })?;
        if parent.is_root() {
            break;
        }
        if let Some(name) = resolved.get(parent_id) {
            prefix = Some(name.as_str());
            break;
        }

        depth += 1;
        if depth > nodes.len() {
            return Err(ConversionError::AccountCycle(id.to_string()));
        }
        names.push(parent.name.as_str());
        cursor = parent;
    }

    names.extend(prefix);
    names.reverse();
    Ok(names.join(separator))
}
