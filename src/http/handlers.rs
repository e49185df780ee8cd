use axum::extract::{Path, State};
use axum::Json;

use crate::error::WalletResult;
use crate::http::models::{
    parse_address, FusePlasmaRequest, InitWalletRequest, InitWalletResponse, PageRequest,
    RestoreWalletRequest, SendRequest, StatusResponse, UnlockWalletRequest,
};
use crate::http::server::AppState;
use crate::http::validation::{ValidJson, ValidQuery};
use crate::node::BlockPage;
use crate::transaction::{AccountBlock, Operation, Token};
use crate::wallet::{AccountIndex, AccountPage};

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let info = state.wallet.info().await;
    Json(StatusResponse::new(info, state.node.status(), state.node.endpoint()))
}

pub async fn init(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<InitWalletRequest>,
) -> WalletResult<Json<InitWalletResponse>> {
    let phrase = state.wallet.init(request.password).await?;
    Ok(Json(InitWalletResponse {
        mnemonic: phrase.to_string(),
    }))
}

pub async fn restore(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<RestoreWalletRequest>,
) -> WalletResult<&'static str> {
    state.wallet.restore(request.password, request.mnemonic).await?;
    Ok("Wallet restored")
}

pub async fn unlock(
    State(state): State<AppState>,
    ValidJson(request): ValidJson<UnlockWalletRequest>,
) -> WalletResult<&'static str> {
    state.wallet.unlock(request.password).await?;
    Ok("Wallet unlocked")
}

pub async fn lock(State(state): State<AppState>) -> &'static str {
    state.wallet.lock().await;
    "Wallet locked"
}

pub async fn accounts(
    State(state): State<AppState>,
    ValidQuery(page): ValidQuery<PageRequest>,
) -> WalletResult<Json<AccountPage>> {
    let (page_index, page_size) = page.resolve(&state.validation);
    Ok(Json(state.accounts.list_accounts(page_index, page_size).await?))
}

pub async fn fuse(
    Path(account_index): Path<String>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<FusePlasmaRequest>,
) -> WalletResult<Json<AccountBlock>> {
    let index: AccountIndex = account_index.parse()?;
    let operation = Operation::Fuse {
        beneficiary: parse_address(&request.address)?,
        amount: request.amount,
    };
    tracing::info!(index = %index, beneficiary = %request.address, "Fuse requested");
    Ok(Json(state.pipeline.build_and_submit(index, operation).await?))
}

pub async fn send(
    Path(account_index): Path<String>,
    State(state): State<AppState>,
    ValidJson(request): ValidJson<SendRequest>,
) -> WalletResult<Json<AccountBlock>> {
    let index: AccountIndex = account_index.parse()?;
    let token: Token = request
        .token_standard
        .parse()
        .map_err(crate::error::WalletError::InvalidArgument)?;
    let operation = Operation::Send {
        to: parse_address(&request.address)?,
        token,
        amount: request.amount,
    };
    tracing::info!(index = %index, to = %request.address, token = token.symbol(), "Send requested");
    Ok(Json(state.pipeline.build_and_submit(index, operation).await?))
}

pub async fn received(
    Path(account_index): Path<String>,
    State(state): State<AppState>,
    ValidQuery(page): ValidQuery<PageRequest>,
) -> WalletResult<Json<BlockPage>> {
    let index: AccountIndex = account_index.parse()?;
    let (page_index, page_size) = page.resolve(&state.validation);
    Ok(Json(state.pipeline.received(index, page_index, page_size).await?))
}
