//! Scope expansion: turns a package, class, or method scope into the
//! complete ordered changeset describing its current definitions.

use crate::backend::{BackendClient, ClassDescriptor, MethodDescriptor};
use crate::change::{Change, ChangeKind};
use crate::changeset::Changeset;
use crate::error::{GraftError, ReadError};
use crate::types::Scope;
use futures::future::join_all;
use tracing::{debug, info};

/// Expands scopes into changesets by reading a source environment.
///
/// Expansion is all-or-nothing: any failed read aborts the whole call,
/// since a partial scope cannot be trusted to represent the scope.
pub struct MigrationPlanner {
    author: String,
}

impl MigrationPlanner {
    pub fn new(author: impl Into<String>) -> Self {
        MigrationPlanner {
            author: author.into(),
        }
    }

    /// Reads every definition in `scope` from `client` and emits the
    /// changes that would recreate it: class-defining changes first in
    /// declared order, then one method change per declared selector.
    pub async fn expand_scope<C: BackendClient + ?Sized>(
        &self,
        scope: &Scope,
        client: &C,
    ) -> Result<Changeset, GraftError> {
        scope.validate()?;
        info!(scope = %scope.label(), "Expanding scope");
        let changes = match scope {
            Scope::Package { name } => self.expand_package(name, client).await?,
            Scope::Class { name } => self.expand_class(name, client).await?,
            Scope::Method { class, selector } => {
                self.expand_method(class, selector, client).await?
            }
        };
        info!(scope = %scope.label(), changes = changes.len(), "Scope expanded");
        Ok(Changeset::new(changes))
    }

    async fn expand_package<C: BackendClient + ?Sized>(
        &self,
        name: &str,
        client: &C,
    ) -> Result<Vec<Change>, GraftError> {
        let package = client.get_package(name).await?;
        debug!(
            package = name,
            classes = package.classes.len(),
            "Read package descriptor"
        );

        // First wave: class and metaclass definitions, one read unit per
        // declared class. join_all keeps declared order regardless of
        // completion order and waits for every read before the first
        // failure aborts.
        let class_units = join_all(package.classes.iter().map(|class| async move {
            let species = client.get_class(class).await?;
            let meta = client.get_class(&species.metaclass_name).await?;
            Ok::<(ClassDescriptor, ClassDescriptor), ReadError>((species, meta))
        }))
        .await;

        let mut changes = Vec::new();
        for unit in class_units {
            let (species, meta) = unit?;
            changes.push(self.class_change(&species));
            changes.push(self.class_change(&meta));
        }

        // Second wave: every declared (class, selector) pair. Declared
        // classes come first in their declared order; classes present
        // only in the method map (extensions) follow in sorted order.
        let mut targets: Vec<(&str, &str)> = Vec::new();
        for class in &package.classes {
            if let Some(selectors) = package.methods_by_class.get(class) {
                for selector in selectors {
                    targets.push((class.as_str(), selector.as_str()));
                }
            }
        }
        for (class, selectors) in &package.methods_by_class {
            if !package.classes.contains(class) {
                for selector in selectors {
                    targets.push((class.as_str(), selector.as_str()));
                }
            }
        }

        let methods = join_all(
            targets
                .iter()
                .map(|&(class, selector)| client.get_method(class, selector)),
        )
        .await;
        for method in methods {
            changes.push(self.method_change(&method?));
        }
        Ok(changes)
    }

    async fn expand_class<C: BackendClient + ?Sized>(
        &self,
        name: &str,
        client: &C,
    ) -> Result<Vec<Change>, GraftError> {
        let species = client.get_class(name).await?;
        let meta = client.get_class(&species.metaclass_name).await?;
        let methods = client.get_methods(name, true).await?;
        let mut changes = vec![self.class_change(&species), self.class_change(&meta)];
        changes.extend(methods.iter().map(|method| self.method_change(method)));
        Ok(changes)
    }

    async fn expand_method<C: BackendClient + ?Sized>(
        &self,
        class: &str,
        selector: &str,
        client: &C,
    ) -> Result<Vec<Change>, GraftError> {
        let method = client.get_method(class, selector).await?;
        Ok(vec![self.method_change(&method)])
    }

    fn class_change(&self, species: &ClassDescriptor) -> Change {
        Change::new(
            ChangeKind::AddClass {
                class: species.name.clone(),
                definition: species.definition.clone(),
            },
            &self.author,
            &species.package,
        )
    }

    fn method_change(&self, method: &MethodDescriptor) -> Change {
        Change::new(
            ChangeKind::AddMethod {
                class: method.class.clone(),
                selector: method.selector.clone(),
                source: method.source.clone(),
            },
            &self.author,
            &method.package,
        )
    }
}
