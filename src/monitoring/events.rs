use metrics::counter;
use tracing::info;

use crate::asset::AssetId;

use super::metrics::prometheus_enabled;

pub fn swap_composed(asset_in: &AssetId, asset_out: &AssetId) {
    info!(
        target: "monitoring::swap",
        event = "composed",
        asset_in = %asset_in,
        asset_out = %asset_out,
        "挂单交易组合完成"
    );

    if prometheus_enabled() {
        counter!(
            "magellan_swap_composed_total",
            "asset_in" => asset_in.to_string(),
            "asset_out" => asset_out.to_string()
        )
        .increment(1);
    }
}

pub fn swap_submitted(asset_in: &AssetId, asset_out: &AssetId) {
    info!(
        target: "monitoring::swap",
        event = "submitted",
        asset_in = %asset_in,
        asset_out = %asset_out,
        "挂单交易已提交"
    );

    if prometheus_enabled() {
        counter!(
            "magellan_swap_submitted_total",
            "asset_in" => asset_in.to_string(),
            "asset_out" => asset_out.to_string()
        )
        .increment(1);
    }
}

/// 节点报输入冲突后触发的重新选币。
pub fn swap_reselected(asset_in: &AssetId, asset_out: &AssetId) {
    info!(
        target: "monitoring::swap",
        event = "reselected",
        asset_in = %asset_in,
        asset_out = %asset_out,
        "输入冲突，重新选币"
    );

    if prometheus_enabled() {
        counter!(
            "magellan_swap_reselected_total",
            "asset_in" => asset_in.to_string(),
            "asset_out" => asset_out.to_string()
        )
        .increment(1);
    }
}

pub fn swap_failed(asset_in: &AssetId, asset_out: &AssetId, stage: &'static str) {
    info!(
        target: "monitoring::swap",
        event = "failed",
        asset_in = %asset_in,
        asset_out = %asset_out,
        stage,
        "swap 执行失败"
    );

    if prometheus_enabled() {
        counter!(
            "magellan_swap_failed_total",
            "stage" => stage,
            "asset_in" => asset_in.to_string(),
            "asset_out" => asset_out.to_string()
        )
        .increment(1);
    }
}
