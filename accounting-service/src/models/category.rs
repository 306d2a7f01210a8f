//! Expense categories form a two-level tree: main categories and their
//! sub-categories.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseCategory {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

impl ExpenseCategory {
    pub fn is_main(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// A main category with its direct children.
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: ExpenseCategory,
    pub children: Vec<ExpenseCategory>,
}

/// Build the tree in input order. Sub-categories whose parent is missing are
/// promoted to the top level so nothing is hidden.
pub fn build_tree(categories: &[ExpenseCategory]) -> Vec<CategoryNode> {
    let mut nodes: Vec<CategoryNode> = categories
        .iter()
        .filter(|c| c.is_main())
        .map(|c| CategoryNode {
            category: c.clone(),
            children: Vec::new(),
        })
        .collect();

    for child in categories.iter().filter(|c| !c.is_main()) {
        match nodes
            .iter_mut()
            .find(|n| Some(n.category.id) == child.parent_id)
        {
            Some(node) => node.children.push(child.clone()),
            None => nodes.push(CategoryNode {
                category: child.clone(),
                children: Vec::new(),
            }),
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str, parent_id: Option<Uuid>) -> ExpenseCategory {
        ExpenseCategory {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.to_string(),
            parent_id,
        }
    }

    #[test]
    fn children_attach_to_their_parent() {
        let office = category("Office", None);
        let rent = category("Rent", Some(office.id));
        let travel = category("Travel", None);

        let tree = build_tree(&[rent.clone(), office.clone(), travel]);

        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].category.name, "Office");
        assert_eq!(tree[0].children, vec![rent]);
        assert!(tree[1].children.is_empty());
    }

    #[test]
    fn orphaned_children_are_promoted() {
        let orphan = category("Fuel", Some(Uuid::new_v4()));
        let tree = build_tree(&[orphan]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].category.name, "Fuel");
    }
}
