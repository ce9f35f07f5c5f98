use anyhow::{ensure, Result};
use candle_core::Tensor;

/// Mean of the token vectors whose mask is set: `[B,T,H] x [B,T] -> [B,H]`.
pub fn masked_mean(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    let (batch, tokens, _) = hidden.dims3()?;
    ensure!(
        attention_mask.dims() == [batch, tokens],
        "mask shape {:?} does not match hidden [{batch}, {tokens}, _]",
        attention_mask.dims()
    );
    let mask = attention_mask.to_device(hidden.device())?.to_dtype(hidden.dtype())?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    // fully masked rows come out as zeros instead of NaN
    let counts = (mask.sum(1)? + 1e-9)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Row-wise L2 normalization of a `[B,H]` tensor.
pub fn l2_normalize(rows: &Tensor) -> Result<Tensor> {
    let norm = (rows.sqr()?.sum_keepdim(1)?.sqrt()? + 1e-12)?;
    Ok(rows.broadcast_div(&norm)?)
}

pub fn masked_mean_l2(hidden: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
    l2_normalize(&masked_mean(hidden, attention_mask)?)
}
