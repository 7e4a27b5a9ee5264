//! # ERC-20 ABI定義
//!
//! デコーダ（transfer/approveの引数解析）とチェーンデータ取得
//! （decimals/symbol/name/balanceOfのeth_call）で共有する。

use alloy_sol_types::SolCall;

alloy_sol_types::sol! {
    /// 標準的なERC-20インターフェース
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
        function name() external view returns (string);
        function balanceOf(address owner) external view returns (uint256);
    }
}

/// `transfer(address,uint256)` のセレクタ（0xa9059cbb）
pub const TRANSFER_SELECTOR: [u8; 4] = IERC20::transferCall::SELECTOR;

/// `approve(address,uint256)` のセレクタ（0x095ea7b3）
pub const APPROVE_SELECTOR: [u8; 4] = IERC20::approveCall::SELECTOR;
