use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, RwLock, Weak};

use tracing::debug;

use super::column::Column;
use super::role::Role;
use crate::error::{Error, Result};
use crate::index::IndexGroup;

/// The composed property definitions of one host type or one instance.
///
/// A class schema owns a private role for its directly declared properties
/// and sees its parent's roles live: roles included into the parent after
/// the subclass was defined are visible in the subclass, never the reverse.
pub struct Schema {
    name: String,
    parent: Option<Arc<Schema>>,
    own_role: Option<Arc<Role>>,
    roles: RwLock<Vec<Arc<Role>>>,
    children: RwLock<Vec<Weak<Schema>>>,
    methods: BTreeSet<String>,
}

impl Schema {
    /// Schema of a host type. `methods` are the type's native method names.
    pub fn for_class(
        name: impl Into<String>,
        parent: Option<Arc<Schema>>,
        methods: BTreeSet<String>,
    ) -> Arc<Self> {
        let name = name.into();
        let own_role = Role::new(name.clone());
        let schema = Arc::new_cyclic(|weak| {
            own_role.register_inclusion(weak.clone());
            Self {
                name,
                parent,
                own_role: Some(own_role.clone()),
                roles: RwLock::new(vec![own_role.clone()]),
                children: RwLock::new(Vec::new()),
                methods,
            }
        });
        if let Some(parent) = &schema.parent {
            parent.register_child(&schema);
        }
        schema
    }

    /// Singleton schema extending `class_schema` for one instance.
    pub fn for_instance(class_schema: &Arc<Schema>) -> Arc<Self> {
        let schema = Arc::new(Self {
            name: format!("#<{}>", class_schema.name),
            parent: Some(class_schema.clone()),
            own_role: None,
            roles: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            methods: BTreeSet::new(),
        });
        class_schema.register_child(&schema);
        schema
    }

    fn register_child(&self, child: &Arc<Schema>) {
        let mut children = self.children.write().unwrap_or_else(|e| e.into_inner());
        children.retain(|c| c.strong_count() > 0);
        children.push(Arc::downgrade(child));
    }

    fn local_roles(&self) -> Vec<Arc<Role>> {
        self.roles.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn children(&self) -> Vec<Arc<Schema>> {
        self.children
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Schema>> {
        self.parent.as_ref()
    }

    /// Role holding the directly declared properties. `None` for instance schemas.
    pub fn own_role(&self) -> Option<&Arc<Role>> {
        self.own_role.as_ref()
    }

    pub fn is_singleton(&self) -> bool {
        self.own_role.is_none()
    }

    /// Inherited roles followed by local ones, without duplicates.
    pub fn roles(&self) -> Vec<Arc<Role>> {
        let mut roles = self.parent.as_ref().map(|p| p.roles()).unwrap_or_default();
        for role in self.local_roles() {
            if !roles.iter().any(|r| Arc::ptr_eq(r, &role)) {
                roles.push(role);
            }
        }
        roles
    }

    pub fn columns(&self) -> Vec<Arc<Column>> {
        let mut columns: Vec<Arc<Column>> = Vec::new();
        for role in self.roles() {
            for column in role.columns() {
                if !columns.iter().any(|c| c.name() == column.name()) {
                    columns.push(column);
                }
            }
        }
        columns
    }

    pub fn column(&self, name: &str) -> Option<Arc<Column>> {
        self.roles().iter().find_map(|role| role.column(name))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.roles().iter().any(|role| role.has_column(name))
    }

    /// The role that declared `name`.
    pub fn column_role(&self, name: &str) -> Option<Arc<Role>> {
        self.roles().into_iter().find(|role| role.has_column(name))
    }

    /// Property names with generated accessors.
    pub fn accessor_names(&self) -> BTreeSet<String> {
        self.roles()
            .iter()
            .flat_map(|role| role.accessor_names())
            .collect()
    }

    /// Whether the host type, or one of its ancestors, defines `name` natively.
    pub fn defines_method(&self, name: &str) -> bool {
        self.methods.contains(name) || self.parent.as_ref().is_some_and(|p| p.defines_method(name))
    }

    pub fn descends_from(&self, other: &Schema) -> bool {
        let mut current = self.parent.as_deref();
        while let Some(schema) = current {
            if std::ptr::eq(schema, other) {
                return true;
            }
            current = schema.parent.as_deref();
        }
        false
    }

    pub fn has_role(&self, role: &Arc<Role>) -> bool {
        self.roles().iter().any(|r| Arc::ptr_eq(r, role))
    }

    /// True when every role composed by `other` is part of this schema.
    pub fn has_roles_of(&self, other: &Schema) -> bool {
        let roles = self.roles();
        other
            .roles()
            .iter()
            .all(|role| roles.iter().any(|r| Arc::ptr_eq(r, role)))
    }

    /// Includes a role. Including the same role again does nothing.
    pub fn include_role(self: &Arc<Self>, role: &Arc<Role>) -> Result<()> {
        self.include(role, false)
    }

    /// Includes every role composed by `other`. Method checks are skipped
    /// when both schemas belong to the same inheritance branch.
    pub fn include_schema(self: &Arc<Self>, other: &Arc<Schema>) -> Result<()> {
        let same_branch = self.descends_from(other) || other.descends_from(self);
        for role in other.roles() {
            self.include(&role, same_branch)?;
        }
        Ok(())
    }

    fn include(self: &Arc<Self>, role: &Arc<Role>, same_branch: bool) -> Result<()> {
        if self.has_role(role) {
            return Ok(());
        }

        for name in role.column_names() {
            let existing = self.column_role(&name).or_else(|| {
                self.descendant_role(&name)
                    .filter(|r| !Arc::ptr_eq(r, role))
            });
            if let Some(existing) = existing {
                return Err(Error::RedefinedProperty(format!(
                    "property '{}' from {} is already defined by {} in {}",
                    name,
                    role.name(),
                    existing.name(),
                    self.name
                )));
            }
            if !same_branch && self.defines_method(&name) {
                return Err(Error::RedefinedMethod(format!(
                    "property '{}' from {} would hide method {}#{}",
                    name,
                    role.name(),
                    self.name,
                    name
                )));
            }
        }

        self.roles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(role.clone());
        role.register_inclusion(Arc::downgrade(self));
        debug!(schema = %self.name, role = %role.name(), "included role");
        Ok(())
    }

    /// Local role of a descendant schema declaring `name`.
    fn descendant_role(&self, name: &str) -> Option<Arc<Role>> {
        self.children().into_iter().find_map(|child| {
            child
                .local_roles()
                .into_iter()
                .find(|role| role.has_column(name))
                .or_else(|| child.descendant_role(name))
        })
    }

    /// Checks a column about to be added to `role`, already part of this schema.
    pub(crate) fn check_column_addition(&self, role: &Role, column: &Column) -> Result<()> {
        let name = column.name();
        let is_own = self
            .own_role
            .as_deref()
            .is_some_and(|own| std::ptr::eq(own, role));

        if !is_own && self.defines_method(name) {
            return Err(Error::RedefinedMethod(format!(
                "property '{}' from {} would hide method {}#{}",
                name,
                role.name(),
                self.name,
                name
            )));
        }

        let conflict = self
            .roles()
            .into_iter()
            .filter(|r| !std::ptr::eq(r.as_ref(), role))
            .find(|r| r.has_column(name))
            .or_else(|| {
                self.descendant_role(name)
                    .filter(|r| !std::ptr::eq(r.as_ref(), role))
            });
        if let Some(existing) = conflict {
            return Err(Error::RedefinedProperty(format!(
                "property '{}' is already defined by {} in {}",
                name,
                existing.name(),
                self.name
            )));
        }
        Ok(())
    }

    /// Index definitions of every composed role, keyed by group.
    pub fn index_groups(&self) -> BTreeMap<String, IndexGroup> {
        let mut groups: BTreeMap<String, IndexGroup> = BTreeMap::new();
        for role in self.roles() {
            for definition in role.defined_indices() {
                groups
                    .entry(definition.target.key())
                    .or_insert_with(|| IndexGroup::new(definition.target.clone()))
                    .definitions
                    .push(definition);
            }
        }
        groups
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("roles", &self.roles())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnOptions;
    use crate::types::PropMap;

    fn methods(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn poet() -> Arc<Role> {
        let role = Role::new("Poet");
        role.string("poem", ColumnOptions::new()).unwrap();
        role
    }

    #[test]
    fn test_disjoint_roles_compose() {
        let schema = Schema::for_class("Developer", None, BTreeSet::new());
        let own = schema.own_role().unwrap();
        own.string(["first_name", "language"], ColumnOptions::new())
            .unwrap();
        schema.include_role(&poet()).unwrap();

        let mut names = schema.column_names();
        names.sort();
        assert_eq!(names, vec!["first_name", "language", "poem"]);
        assert_eq!(schema.column_role("poem").unwrap().name(), "Poet");
        assert_eq!(schema.column_role("language").unwrap().name(), "Developer");
    }

    #[test]
    fn test_include_is_idempotent() {
        let schema = Schema::for_class("Developer", None, BTreeSet::new());
        let role = poet();
        schema.include_role(&role).unwrap();
        schema.include_role(&role).unwrap();
        assert_eq!(schema.column_names(), vec!["poem"]);
        assert_eq!(schema.roles().len(), 2);
        assert_eq!(schema.accessor_names().len(), 1);
    }

    #[test]
    fn test_overlapping_roles_conflict() {
        let schema = Schema::for_class("Developer", None, BTreeSet::new());
        schema.include_role(&poet()).unwrap();

        let other = Role::new("Rapper");
        other.string("poem", ColumnOptions::new()).unwrap();
        let err = schema.include_role(&other).unwrap_err();
        assert!(matches!(err, Error::RedefinedProperty(msg) if msg.contains("Rapper")));
        assert!(!schema.has_role(&other));
    }

    #[test]
    fn test_method_shadowing_conflict() {
        let schema = Schema::for_class("Developer", None, methods(&["poem"]));
        let err = schema.include_role(&poet()).unwrap_err();
        assert!(matches!(err, Error::RedefinedMethod(_)));
    }

    #[test]
    fn test_column_added_after_inclusion_is_checked() {
        let schema = Schema::for_class("Developer", None, methods(&["age"]));
        schema.own_role().unwrap().string("name", ColumnOptions::new()).unwrap();
        let role = poet();
        schema.include_role(&role).unwrap();

        assert!(matches!(
            role.string("name", ColumnOptions::new()),
            Err(Error::RedefinedProperty(_))
        ));
        assert!(matches!(
            role.integer("age", ColumnOptions::new()),
            Err(Error::RedefinedMethod(_))
        ));
        role.string("muse", ColumnOptions::new()).unwrap();
        assert!(schema.has_column("muse"));
    }

    #[test]
    fn test_subclass_sees_parent_additions() {
        let parent = Schema::for_class("Employee", None, BTreeSet::new());
        let child = Schema::for_class("Developer", Some(parent.clone()), BTreeSet::new());

        parent.own_role().unwrap().string("first_name", ColumnOptions::new()).unwrap();
        child.own_role().unwrap().string("language", ColumnOptions::new()).unwrap();
        parent.include_role(&poet()).unwrap();

        let mut names = child.column_names();
        names.sort();
        assert_eq!(names, vec!["first_name", "language", "poem"]);
        assert_eq!(parent.column_names(), vec!["first_name", "poem"]);
        assert!(child.descends_from(&parent));
        assert!(!parent.descends_from(&child));
    }

    #[test]
    fn test_parent_addition_conflicting_with_child_fails() {
        let parent = Schema::for_class("Employee", None, BTreeSet::new());
        let child = Schema::for_class("Developer", Some(parent.clone()), BTreeSet::new());
        child.own_role().unwrap().string("language", ColumnOptions::new()).unwrap();

        let err = parent
            .own_role()
            .unwrap()
            .string("language", ColumnOptions::new())
            .unwrap_err();
        assert!(matches!(err, Error::RedefinedProperty(_)));
    }

    #[test]
    fn test_include_schema_of_other_class() {
        let employee = Schema::for_class("Employee", None, BTreeSet::new());
        employee.own_role().unwrap().string("first_name", ColumnOptions::new()).unwrap();
        employee.include_role(&poet()).unwrap();

        let contact = Schema::for_class("Contact", None, BTreeSet::new());
        contact.include_schema(&employee).unwrap();
        assert!(contact.has_roles_of(&employee));
        assert_eq!(contact.roles().len(), 3);

        let instance = Schema::for_instance(&employee);
        assert!(instance.is_singleton());
        assert!(instance.has_roles_of(&employee));
    }

    #[test]
    fn test_same_branch_skips_method_check() {
        let parent = Schema::for_class("Employee", None, methods(&["motto"]));
        let child = Schema::for_class("Poet", Some(parent.clone()), BTreeSet::new());
        child.own_role().unwrap().string("motto", ColumnOptions::new()).unwrap();

        let stranger = Schema::for_class("Reader", None, methods(&["motto"]));
        assert!(matches!(
            stranger.include_schema(&child),
            Err(Error::RedefinedMethod(_))
        ));

        parent.include_schema(&child).unwrap();
        assert!(parent.has_column("motto"));
        assert_eq!(child.column_names(), vec!["motto"]);
    }

    #[test]
    fn test_index_groups() {
        let schema = Schema::for_class("Dog", None, BTreeSet::new());
        let own = schema.own_role().unwrap();
        own.string("name", ColumnOptions::new().index("special")).unwrap();
        own.integer("age", ColumnOptions::new().indexed()).unwrap();
        own.index("integer", |_| PropMap::new());

        let groups = schema.index_groups();
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["integer", "special"]);
        assert_eq!(groups["integer"].definitions.len(), 2);
        assert_eq!(groups["special"].definitions[0].column.as_deref(), Some("name"));
    }
}
