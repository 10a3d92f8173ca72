use axum::extract::{Path, Query, State};
use axum::Json;
use futures::future::try_join_all;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use ledgerql_core::types::{
    AccountEncoding, AccountQuery, Address, BlockQuery, Commitment, DataSlice,
    ProgramAccountsQuery, Slot, TransactionQuery,
};
use ledgerql_core::{Account, Context, Selection};

use super::error::AppError;
use super::limits::effective_limits;
use super::SharedState;

// ==============================================================================
// DTOs
// ==============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AccountParams {
    commitment: Option<Commitment>,
    encoding: Option<AccountEncoding>,
    min_context_slot: Option<u64>,
    data_slice_offset: Option<u64>,
    data_slice_length: Option<u64>,
    /// Comma-separated selection paths, e.g. `owner,data.mint/owner`.
    expand: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) enum QueryField {
    Account,
    ProgramAccounts,
    Block,
    Transaction,
}

impl QueryField {
    fn name(self) -> &'static str {
        match self {
            Self::Account => "account",
            Self::ProgramAccounts => "programAccounts",
            Self::Block => "block",
            Self::Transaction => "transaction",
        }
    }
}

#[derive(Deserialize)]
pub(super) struct QueryRequest {
    field: QueryField,
    #[serde(default)]
    args: Value,
    #[serde(default)]
    expand: Vec<String>,
}

#[derive(Serialize)]
pub(super) struct QueryResponse {
    data: Value,
}

// ==============================================================================
// Handlers
// ==============================================================================

pub(super) async fn get_account(
    State(state): State<SharedState>,
    Path(address): Path<String>,
    Query(params): Query<AccountParams>,
) -> Result<Json<QueryResponse>, AppError> {
    let address =
        Address::parse(&address).map_err(|e| AppError::BadRequest(e.to_string()))?;

    let data_slice = match (params.data_slice_offset, params.data_slice_length) {
        (Some(offset), Some(length)) => Some(DataSlice { offset, length }),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "dataSliceOffset and dataSliceLength must be set together".to_owned(),
            ));
        }
    };
    let query = AccountQuery {
        address,
        commitment: params.commitment,
        data_slice,
        encoding: params.encoding,
        min_context_slot: params.min_context_slot.map(Slot),
    };
    let paths: Vec<&str> = params
        .expand
        .as_deref()
        .map(|list| list.split(',').filter(|p| !p.trim().is_empty()).collect())
        .unwrap_or_default();
    let selection = Selection::parse(paths)?;

    let ctx = state.context();
    let account = ctx.resolve_account(&query).await?;
    let data = match account {
        Some(account) => expand_one(&state, &ctx, account, &query, &selection).await?,
        None => Value::Null,
    };
    Ok(Json(QueryResponse { data }))
}

pub(super) async fn post_query(
    State(state): State<SharedState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError> {
    let field = request.field;
    if matches!(field, QueryField::Block | QueryField::Transaction) {
        if !state.enable_block_queries {
            return Err(AppError::NotFound(format!("field disabled: {}", field.name())));
        }
        if !request.expand.is_empty() {
            return Err(AppError::BadRequest(format!(
                "expand is not supported on {}",
                field.name()
            )));
        }
    }
    let selection = Selection::parse(&request.expand)?;
    let ctx = state.context();

    let data = match field {
        QueryField::Account => {
            let query: AccountQuery = parse_args(field, request.args)?;
            match ctx.resolve_account(&query).await? {
                Some(account) => expand_one(&state, &ctx, account, &query, &selection).await?,
                None => Value::Null,
            }
        }
        QueryField::ProgramAccounts => {
            let query: ProgramAccountsQuery = parse_args(field, request.args)?;
            let accounts = ctx.resolve_program_accounts(&query).await?;
            let expanded = try_join_all(accounts.into_iter().map(|account| {
                let args = query.account_query(account.address.clone());
                let (state, ctx, selection) = (&state, &ctx, &selection);
                async move { expand_one(state, ctx, account, &args, selection).await }
            }))
            .await?;
            Value::Array(expanded)
        }
        QueryField::Block => {
            let query: BlockQuery = parse_args(field, request.args)?;
            serde_json::to_value(ctx.resolve_block(&query).await?)?
        }
        QueryField::Transaction => {
            let query: TransactionQuery = parse_args(field, request.args)?;
            serde_json::to_value(ctx.resolve_transaction(&query).await?)?
        }
    };
    Ok(Json(QueryResponse { data }))
}

// ==============================================================================
// Helpers
// ==============================================================================

fn parse_args<T: DeserializeOwned>(field: QueryField, args: Value) -> Result<T, AppError> {
    serde_json::from_value(args)
        .map_err(|e| AppError::BadRequest(format!("invalid {} args: {e}", field.name())))
}

async fn expand_one(
    state: &SharedState,
    ctx: &Context,
    account: Account,
    args: &AccountQuery,
    selection: &Selection,
) -> Result<Value, AppError> {
    if selection.is_empty() {
        return Ok(serde_json::to_value(&account)?);
    }
    let limits = effective_limits(&state.expand_limits);
    let resolved = ctx.expand(account, args, selection, &limits).await?;
    Ok(serde_json::to_value(&resolved)?)
}
