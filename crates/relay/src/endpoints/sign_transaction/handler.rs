use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use cosign_types::{SignTransactionRequest, SignTransactionResponse, SubmissionStatus};
use tracing::Instrument;

use crate::broadcast::SubmissionOutcome;
use crate::config::{RelayState, SignerPolicy};
use crate::cosign::co_sign;
use crate::error::RelayError;
use crate::transaction::InboundTransaction;

/// POST /api/sign-transaction — 共同署名 + ブロードキャスト代行。
///
/// フロントエンドが構築しAuthorityが部分署名したトランザクションを受け取り、
/// fee payerが運用ウォレットであることを確認してから運用ウォレットで署名し、
/// Solanaにブロードキャストして確定を待つ。
pub async fn handle_sign_transaction(
    State(state): State<Arc<RelayState>>,
    payload: Result<Json<SignTransactionRequest>, JsonRejection>,
) -> Result<Json<SignTransactionResponse>, RelayError> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("sign_transaction", %request_id);

    let result = process(state, payload).instrument(span.clone()).await;
    if let Err(e) = &result {
        span.in_scope(|| {
            tracing::warn!(category = e.category(), error = %e, "リクエストを拒否しました");
        });
    }
    result.map(Json)
}

/// POST以外のメソッドへの応答。
pub async fn handle_method_not_allowed() -> RelayError {
    RelayError::MethodNotAllowed
}

async fn process(
    state: Arc<RelayState>,
    payload: Result<Json<SignTransactionRequest>, JsonRejection>,
) -> Result<SignTransactionResponse, RelayError> {
    let encoded = match payload {
        Ok(Json(body)) => body.transaction_base64,
        Err(rejection) => {
            tracing::debug!(%rejection, "リクエスト本体を解釈できません");
            None
        }
    }
    .filter(|s| !s.trim().is_empty())
    .ok_or(RelayError::MissingTransaction)?;

    // Step 1: デコードとfee payer照合（署名より前）
    let inbound = InboundTransaction::decode_base64(&encoded)
        .map_err(|e| RelayError::MalformedTransaction(e.to_string()))?;

    let authorized = inbound.authorize(&state.identity.pubkey()).map_err(|e| {
        tracing::info!(fee_payer = %e.fee_payer, "fee payerが運用ウォレットではありません");
        RelayError::UnauthorizedFeePayer
    })?;

    if state.signer_policy == SignerPolicy::RequireComplete {
        let missing = authorized.missing_cosigners();
        if !missing.is_empty() {
            return Err(RelayError::IncompleteSignatures(missing));
        }
    }

    // Step 2: 運用ウォレットで共同署名
    let signed = co_sign(authorized, &state.identity).map_err(|e| {
        tracing::error!(error = %e, "共同署名に失敗しました");
        RelayError::SigningFailure
    })?;
    let raw = signed.serialize().map_err(|e| {
        tracing::error!(error = %e, "共同署名に失敗しました");
        RelayError::SigningFailure
    })?;
    let expected = signed.signature();

    // Step 3: ブロードキャストと確定待ち。
    // 送信後は取り消せないので、クライアントが切断しても最後まで待ってログに残す。
    let broadcaster = state.broadcaster.clone();
    let task = tokio::spawn(
        async move {
            let outcome = broadcaster.submit_and_confirm(raw, expected).await;
            outcome.log();
            outcome
        }
        .in_current_span(),
    );

    let outcome = task
        .await
        .map_err(|e| RelayError::Internal(format!("ブロードキャストタスクが異常終了: {e}")))?;

    outcome_to_response(outcome)
}

fn outcome_to_response(outcome: SubmissionOutcome) -> Result<SignTransactionResponse, RelayError> {
    match outcome {
        SubmissionOutcome::Confirmed { signature } => Ok(SignTransactionResponse {
            signature: signature.to_string(),
            status: SubmissionStatus::Confirmed,
        }),
        SubmissionOutcome::Pending { signature } => Ok(SignTransactionResponse {
            signature: signature.to_string(),
            status: SubmissionStatus::Pending,
        }),
        SubmissionOutcome::OnChainFailure { signature, error } => {
            Err(RelayError::OnChainFailure { signature, error })
        }
        SubmissionOutcome::Rejected { reason, details } => {
            Err(RelayError::Rejected { reason, details })
        }
        SubmissionOutcome::TransportFailure { signature, reason } => {
            Err(RelayError::Transport { signature, reason })
        }
    }
}
