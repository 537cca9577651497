use crate::image::ImageLoader;
use crate::utils::error::PredictError;
use crate::Result;
use image::imageops::{self, FilterType};
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};

/// 模型输入边长
pub const INPUT_SIZE: u32 = 224;

pub const INPUT_CHANNELS: usize = 3;

/// 缩放算法固定为双线性，不同算法会得到不同的数值结果
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// 模型输入张量，形状固定为 [1, 224, 224, 3] (NHWC)
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }
}

pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// 上传字节 -> 模型输入
    ///
    /// MIME 检查在解码之前完成；像素值只做 u8 -> f32 转换，不做归一化缩放，
    /// 与模型导出时的输入约定一致。
    pub fn preprocess(bytes: &[u8], content_type: &str) -> Result<InputTensor> {
        ImageLoader::validate_content_type(content_type)?;
        ImageLoader::validate_size(bytes.len())?;

        let image = ImageLoader::from_bytes(bytes)?;
        Self::to_tensor(&image)
    }

    pub fn to_tensor(image: &DynamicImage) -> Result<InputTensor> {
        // 灰度图和带透明通道的图统一转为 RGB
        let rgb_image = image.to_rgb8();
        let resized = imageops::resize(&rgb_image, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER);

        let side = INPUT_SIZE as usize;
        let data: Vec<f32> = resized.into_raw().into_iter().map(f32::from).collect();

        let array = Array4::from_shape_vec((1, side, side, INPUT_CHANNELS), data)
            .map_err(|e| PredictError::Internal(format!("Failed to build input tensor: {}", e)))?;

        Ok(InputTensor(array))
    }
}
