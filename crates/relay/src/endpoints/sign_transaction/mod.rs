//! # POST /api/sign-transaction
//!
//! デコード → fee payer照合 → 共同署名 → ブロードキャスト・確定待ち。

mod handler;

pub use handler::{handle_method_not_allowed, handle_sign_transaction};
