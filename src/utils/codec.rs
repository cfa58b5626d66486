// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 二进制负载编解码
//!
//! 分类器模型等二进制数据在经过文本总线传输前使用 base64 编码，
//! 缺失的负载（`None`）编解码后仍然是 `None`。

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::utils::errors::DecodeError;

/// 编码模型数据
pub fn encode_model_data(data: Option<&[u8]>) -> Option<String> {
    data.map(|bytes| STANDARD.encode(bytes))
}

/// 解码模型数据
///
/// # 返回值
///
/// * `Ok(None)` - 输入为 `None`
/// * `Ok(Some(bytes))` - 解码后的字节
/// * `Err(DecodeError)` - 输入不是合法的 base64
pub fn decode_model_data(data: Option<&str>) -> Result<Option<Vec<u8>>, DecodeError> {
    match data {
        Some(text) => Ok(Some(STANDARD.decode(text.trim())?)),
        None => Ok(None),
    }
}
