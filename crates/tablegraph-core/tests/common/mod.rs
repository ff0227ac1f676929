//! Entity fixtures: a four-level tree (Root -> Base -> Branch -> Leaf),
//! each level persisted in its own table. This is the statically authored
//! declaration surface a caller of the library writes.

use chrono::{DateTime, Utc};

use tablegraph_core::{AnyEntity, Cardinality, Entity, NavigationDef, TableRow, Value};

#[derive(Debug, Default, Clone)]
pub struct Root {
    pub id: String,
    pub partition: String,
    pub created_at: Option<DateTime<Utc>>,
    pub hello: i64,
    pub base: Option<Base>,
}

#[derive(Debug, Default, Clone)]
pub struct Base {
    pub id: String,
    pub partition: String,
    pub root_id: String,
    pub branches: Vec<Branch>,
}

#[derive(Debug, Default, Clone)]
pub struct Branch {
    pub id: String,
    pub partition: String,
    pub base_id: String,
    pub leaves: Vec<Leaf>,
}

#[derive(Debug, Default, Clone)]
pub struct Leaf {
    pub id: String,
    pub partition: String,
    pub branch_id: String,
}

fn str_field(row: &TableRow, name: &str) -> String {
    row.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl Entity for Root {
    fn type_name() -> &'static str {
        "Root"
    }

    fn table() -> &'static str {
        "Roots"
    }

    fn navigations() -> Vec<NavigationDef> {
        vec![NavigationDef {
            name: "base",
            target: "Base",
            foreign_key: "RootId",
            cardinality: Cardinality::Single,
            children: |e| {
                let root = e.as_any().downcast_ref::<Root>().unwrap();
                root.base.iter().map(|b| b as &dyn AnyEntity).collect()
            },
            children_mut: |e| {
                let root = e.as_any_mut().downcast_mut::<Root>().unwrap();
                root.base.iter_mut().map(|b| b as &mut dyn AnyEntity).collect()
            },
            attach: |e, children| {
                let root = e.as_any_mut().downcast_mut::<Root>().unwrap();
                root.base = children
                    .into_iter()
                    .next()
                    .and_then(|c| c.into_any().downcast::<Base>().ok())
                    .map(|c| *c);
            },
        }]
    }

    fn from_row(row: &TableRow) -> Self {
        Root {
            id: row.row_key.clone(),
            partition: row.partition_key.clone(),
            created_at: row.created_at(),
            hello: row.get("Hello").and_then(Value::as_i64).unwrap_or_default(),
            base: None,
        }
    }

    fn row_key(&self) -> &str {
        &self.id
    }

    fn set_row_key(&mut self, key: String) {
        self.id = key;
    }

    fn partition_key(&self) -> &str {
        &self.partition
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    fn set_created_at(&mut self, at: DateTime<Utc>) {
        self.created_at = Some(at);
    }

    fn fields(&self) -> Vec<(String, Value)> {
        vec![("Hello".to_string(), Value::Int(self.hello))]
    }

    fn set_field(&mut self, name: &str, value: &Value) {
        if name == "Hello" {
            if let Some(v) = value.as_i64() {
                self.hello = v;
            }
        }
    }
}

impl Entity for Base {
    fn type_name() -> &'static str {
        "Base"
    }

    fn table() -> &'static str {
        "Bases"
    }

    fn navigations() -> Vec<NavigationDef> {
        vec![NavigationDef {
            name: "branches",
            target: "Branch",
            foreign_key: "BaseId",
            cardinality: Cardinality::Many,
            children: |e| {
                let base = e.as_any().downcast_ref::<Base>().unwrap();
                base.branches.iter().map(|b| b as &dyn AnyEntity).collect()
            },
            children_mut: |e| {
                let base = e.as_any_mut().downcast_mut::<Base>().unwrap();
                base.branches
                    .iter_mut()
                    .map(|b| b as &mut dyn AnyEntity)
                    .collect()
            },
            attach: |e, children| {
                let base = e.as_any_mut().downcast_mut::<Base>().unwrap();
                base.branches = children
                    .into_iter()
                    .filter_map(|c| c.into_any().downcast::<Branch>().ok())
                    .map(|c| *c)
                    .collect();
            },
        }]
    }

    fn from_row(row: &TableRow) -> Self {
        Base {
            id: row.row_key.clone(),
            partition: row.partition_key.clone(),
            root_id: str_field(row, "RootId"),
            branches: Vec::new(),
        }
    }

    fn row_key(&self) -> &str {
        &self.id
    }

    fn set_row_key(&mut self, key: String) {
        self.id = key;
    }

    fn partition_key(&self) -> &str {
        &self.partition
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_created_at(&mut self, _at: DateTime<Utc>) {}

    fn fields(&self) -> Vec<(String, Value)> {
        vec![("RootId".to_string(), Value::Str(self.root_id.clone()))]
    }

    fn set_field(&mut self, name: &str, value: &Value) {
        if name == "RootId" {
            if let Some(s) = value.as_str() {
                self.root_id = s.to_string();
            }
        }
    }
}

impl Entity for Branch {
    fn type_name() -> &'static str {
        "Branch"
    }

    fn table() -> &'static str {
        "Branches"
    }

    fn navigations() -> Vec<NavigationDef> {
        vec![NavigationDef {
            name: "leaves",
            target: "Leaf",
            foreign_key: "BranchId",
            cardinality: Cardinality::Many,
            children: |e| {
                let branch = e.as_any().downcast_ref::<Branch>().unwrap();
                branch.leaves.iter().map(|l| l as &dyn AnyEntity).collect()
            },
            children_mut: |e| {
                let branch = e.as_any_mut().downcast_mut::<Branch>().unwrap();
                branch
                    .leaves
                    .iter_mut()
                    .map(|l| l as &mut dyn AnyEntity)
                    .collect()
            },
            attach: |e, children| {
                let branch = e.as_any_mut().downcast_mut::<Branch>().unwrap();
                branch.leaves = children
                    .into_iter()
                    .filter_map(|c| c.into_any().downcast::<Leaf>().ok())
                    .map(|c| *c)
                    .collect();
            },
        }]
    }

    fn from_row(row: &TableRow) -> Self {
        Branch {
            id: row.row_key.clone(),
            partition: row.partition_key.clone(),
            base_id: str_field(row, "BaseId"),
            leaves: Vec::new(),
        }
    }

    fn row_key(&self) -> &str {
        &self.id
    }

    fn set_row_key(&mut self, key: String) {
        self.id = key;
    }

    fn partition_key(&self) -> &str {
        &self.partition
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_created_at(&mut self, _at: DateTime<Utc>) {}

    fn fields(&self) -> Vec<(String, Value)> {
        vec![("BaseId".to_string(), Value::Str(self.base_id.clone()))]
    }

    fn set_field(&mut self, name: &str, value: &Value) {
        if name == "BaseId" {
            if let Some(s) = value.as_str() {
                self.base_id = s.to_string();
            }
        }
    }
}

impl Entity for Leaf {
    fn type_name() -> &'static str {
        "Leaf"
    }

    fn table() -> &'static str {
        "Leaves"
    }

    fn navigations() -> Vec<NavigationDef> {
        vec![]
    }

    fn from_row(row: &TableRow) -> Self {
        Leaf {
            id: row.row_key.clone(),
            partition: row.partition_key.clone(),
            branch_id: str_field(row, "BranchId"),
        }
    }

    fn row_key(&self) -> &str {
        &self.id
    }

    fn set_row_key(&mut self, key: String) {
        self.id = key;
    }

    fn partition_key(&self) -> &str {
        &self.partition
    }

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }

    fn set_created_at(&mut self, _at: DateTime<Utc>) {}

    fn fields(&self) -> Vec<(String, Value)> {
        vec![("BranchId".to_string(), Value::Str(self.branch_id.clone()))]
    }

    fn set_field(&mut self, name: &str, value: &Value) {
        if name == "BranchId" {
            if let Some(s) = value.as_str() {
                self.branch_id = s.to_string();
            }
        }
    }
}

/// A root with one base and the given number of branches.
pub fn tree(id: &str, partition: &str, branches: usize) -> Root {
    Root {
        id: id.to_string(),
        partition: partition.to_string(),
        base: Some(Base {
            branches: (0..branches).map(|_| Branch::default()).collect(),
            ..Base::default()
        }),
        ..Root::default()
    }
}
