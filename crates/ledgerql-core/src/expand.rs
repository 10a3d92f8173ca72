//! Selection-driven recursive resolution.
//!
//! A [`Selection`] names which address-valued fields to follow, and how far.
//! [`Context::expand`] walks it from a resolved account, fetching every
//! selected field concurrently and recursing into the results. A field
//! that fails records its error in place; its siblings are unaffected.

use std::collections::BTreeMap;

use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use serde::Serialize;
use tracing::warn;

use crate::account::{Account, AddressField};
use crate::context::Context;
use crate::error::CoreError;
use crate::types::AccountQuery;

/// Separator between nesting levels in a selection path.
pub const PATH_SEPARATOR: char = '/';

// ==============================================================================
// Selection
// ==============================================================================

/// A tree of address-valued fields to resolve.
///
/// Built from paths like `owner` or `data.mintAuthority/owner`, where each
/// `/` descends into the account the previous field resolved to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    fields: BTreeMap<AddressField, Selection>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse<S: AsRef<str>>(paths: impl IntoIterator<Item = S>) -> Result<Self, CoreError> {
        let mut selection = Self::new();
        for path in paths {
            selection.add_path(path.as_ref())?;
        }
        Ok(selection)
    }

    pub fn add_path(&mut self, path: &str) -> Result<(), CoreError> {
        let mut node = self;
        for segment in path.split(PATH_SEPARATOR) {
            let segment = segment.trim();
            let field = AddressField::from_path(segment).ok_or_else(|| {
                CoreError::InvalidArgument(format!(
                    "unknown address field `{segment}` in selection `{path}`"
                ))
            })?;
            node = node.fields.entry(field).or_default();
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Longest path length; zero for an empty selection.
    pub fn depth(&self) -> usize {
        self.fields
            .values()
            .map(|sub| 1 + sub.depth())
            .max()
            .unwrap_or(0)
    }

    /// Total number of selected fields at every level.
    pub fn field_count(&self) -> usize {
        self.fields.values().map(|sub| 1 + sub.field_count()).sum()
    }

    pub fn fields(&self) -> impl Iterator<Item = (AddressField, &Selection)> {
        self.fields.iter().map(|(field, sub)| (*field, sub))
    }
}

// ==============================================================================
// Limits
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandLimits {
    pub max_depth: usize,
    pub max_fields: usize,
}

impl Default for ExpandLimits {
    fn default() -> Self {
        Self {
            max_depth: 4,
            max_fields: 64,
        }
    }
}

impl ExpandLimits {
    pub fn check(&self, selection: &Selection) -> Result<(), CoreError> {
        let depth = selection.depth();
        if depth > self.max_depth {
            return Err(CoreError::InvalidArgument(format!(
                "selection depth {depth} exceeds limit {}",
                self.max_depth
            )));
        }
        let count = selection.field_count();
        if count > self.max_fields {
            return Err(CoreError::InvalidArgument(format!(
                "selection has {count} fields, limit is {}",
                self.max_fields
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// Results
// ==============================================================================

/// An account plus the selected fields resolved beneath it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedAccount {
    #[serde(flatten)]
    pub account: Account,
    /// Keyed by field path.
    #[serde(rename = "resolved", skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<&'static str, FieldResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldResult {
    Account(Box<ResolvedAccount>),
    List(Vec<FieldResult>),
    Null,
    Error { error: String },
}

// ==============================================================================
// Expansion
// ==============================================================================

impl Context {
    /// Resolve `selection` beneath `account`. Nested fetches use `args` for
    /// every configuration argument except the address.
    pub async fn expand(
        &self,
        account: Account,
        args: &AccountQuery,
        selection: &Selection,
        limits: &ExpandLimits,
    ) -> Result<ResolvedAccount, CoreError> {
        limits.check(selection)?;
        Ok(self.expand_account(account, args, selection).await)
    }

    fn expand_account<'a>(
        &'a self,
        account: Account,
        args: &'a AccountQuery,
        selection: &'a Selection,
    ) -> BoxFuture<'a, ResolvedAccount> {
        async move {
            let parent = &account;
            let pending = selection.fields().map(move |(field, sub)| async move {
                (field.path(), self.expand_field(parent, field, args, sub).await)
            });
            let fields = join_all(pending).await.into_iter().collect();
            ResolvedAccount { account, fields }
        }
        .boxed()
    }

    async fn expand_field(
        &self,
        parent: &Account,
        field: AddressField,
        args: &AccountQuery,
        selection: &Selection,
    ) -> FieldResult {
        if field.is_list() {
            let items = self.resolve_account_list_field(parent, field, args).await;
            FieldResult::List(
                join_all(items.into_iter().map(|item| async move {
                    match item {
                        Ok(item) => self.expand_child(item, args, selection).await,
                        Err(e) => field_error(parent, field, e),
                    }
                }))
                .await,
            )
        } else {
            match self.resolve_account_field(parent, field, args).await {
                Ok(item) => self.expand_child(item, args, selection).await,
                Err(e) => field_error(parent, field, e),
            }
        }
    }

    async fn expand_child(
        &self,
        item: Option<Account>,
        args: &AccountQuery,
        selection: &Selection,
    ) -> FieldResult {
        match item {
            Some(account) => FieldResult::Account(Box::new(
                self.expand_account(account, args, selection).await,
            )),
            None => FieldResult::Null,
        }
    }
}

fn field_error(parent: &Account, field: AddressField, err: CoreError) -> FieldResult {
    warn!(account = %parent.address, field = field.path(), error = %err, "field resolution failed");
    FieldResult::Error {
        error: err.to_string(),
    }
}
