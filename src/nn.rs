//! Neural Network inference.

use std::{ops::Index, path::Path, sync::Arc};

use anyhow::{bail, Context};
use tract_onnx::prelude::{
    tvec, Framework, Graph, InferenceModelExt, SimplePlan, TValue, TypedFact, TypedOp,
};

use crate::image::{Color, Image, Resolution, RotatedRect};

type Model = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A neural network that can be used for inference.
pub struct NeuralNetwork {
    inner: Model,
}

impl NeuralNetwork {
    /// Loads and optimizes a pre-trained model from an ONNX file.
    ///
    /// Returns an error if the file cannot be read, the network data is malformed, or if the
    /// network uses unimplemented operations.
    pub fn from_path<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::from_path_impl(path.as_ref())
    }

    fn from_path_impl(path: &Path) -> anyhow::Result<Self> {
        match path.extension() {
            Some(ext) if ext == "onnx" => {}
            _ => bail!(
                "neural network file '{}' must have `.onnx` extension",
                path.display()
            ),
        }

        let graph = tract_onnx::onnx()
            .model_for_path(path)
            .with_context(|| format!("failed to load network '{}'", path.display()))?
            .into_optimized()?;
        let inner = SimplePlan::new(graph)?;
        log::debug!("loaded network '{}'", path.display());

        Ok(Self { inner })
    }

    /// Returns the number of input nodes of the network.
    pub fn num_inputs(&self) -> usize {
        self.inner.model().inputs.len()
    }

    /// Returns the concrete shape of the input at `index`.
    pub fn input_shape(&self, index: usize) -> anyhow::Result<Vec<usize>> {
        let fact = self.inner.model().input_fact(index)?;
        match fact.shape.as_concrete() {
            Some(shape) => Ok(shape.to_vec()),
            None => bail!("network input {index} has a symbolic shape"),
        }
    }

    /// Runs the network on a single input tensor, returning all of its outputs.
    #[doc(alias = "infer")]
    pub fn estimate(&self, shape: &[usize], data: &[f32]) -> anyhow::Result<Outputs> {
        let input = tract_onnx::prelude::Tensor::from_shape(shape, data)?;
        let outputs = self.inner.run(tvec![TValue::from_const(Arc::new(input))])?;
        let inner = outputs
            .iter()
            .map(|value| -> anyhow::Result<Tensor> {
                Ok(Tensor {
                    shape: value.shape().to_vec(),
                    data: value.as_slice::<f32>()?.to_vec(),
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Outputs { inner })
    }
}

/// An `f32` output tensor of a network.
#[derive(Debug, Clone)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Returns the shape of this tensor.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the tensor data in row-major order.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// Checks that this tensor has the `expected` shape.
    pub fn expect_shape(&self, expected: &[usize]) -> anyhow::Result<&Self> {
        if self.shape != expected {
            bail!(
                "unexpected network output shape {:?} (expected {:?})",
                self.shape,
                expected
            );
        }
        Ok(self)
    }
}

/// The output tensors of a network invocation.
#[derive(Debug)]
pub struct Outputs {
    inner: Vec<Tensor>,
}

impl Outputs {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Index<usize> for Outputs {
    type Output = Tensor;

    fn index(&self, index: usize) -> &Tensor {
        &self.inner[index]
    }
}

/// A convolutional neural network (CNN) that takes a single `[1, 3, H, W]` RGB image input.
///
/// Color channels are mapped linearly from `0..=255` to `0.0..=1.0`.
pub struct Cnn {
    nn: NeuralNetwork,
    input_res: Resolution,
}

impl Cnn {
    /// Loads a CNN from an ONNX file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Self::new(NeuralNetwork::from_path(path)?)
    }

    pub fn new(nn: NeuralNetwork) -> anyhow::Result<Self> {
        if nn.num_inputs() != 1 {
            bail!(
                "CNN network has to take exactly 1 input, this one takes {}",
                nn.num_inputs(),
            );
        }

        let shape = nn.input_shape(0)?;
        let (w, h) = match &*shape {
            [1, 3, h, w] => (*w, *h),
            _ => bail!("invalid model input shape for NCHW CNN: {:?}", shape),
        };

        let (w, h): (u32, u32) = (w.try_into()?, h.try_into()?);
        Ok(Self {
            nn,
            input_res: Resolution::new(w, h),
        })
    }

    /// Returns the expected input image size.
    #[inline]
    pub fn input_resolution(&self) -> Resolution {
        self.input_res
    }

    /// Runs the network on the region `roi` of `image`.
    ///
    /// The region is resampled to the network's input resolution, stretching it if the aspect
    /// ratios differ. Parts of the region outside of the image are black.
    pub fn estimate(&self, image: &Image, roi: &RotatedRect) -> anyhow::Result<Outputs> {
        let res = self.input_res;
        let data = sample_nchw(image, roi, res);
        self.nn.estimate(
            &[1, 3, res.height() as usize, res.width() as usize],
            &data,
        )
    }
}

/// Samples the region `roi` of `image` into an NCHW tensor of size `res`, with values in
/// `0.0..=1.0`.
///
/// Uses nearest-neighbor sampling at the center of each target pixel.
pub fn sample_nchw(image: &Image, roi: &RotatedRect, res: Resolution) -> Vec<f32> {
    let (w, h) = (res.width() as usize, res.height() as usize);
    let (roi_w, roi_h) = (roi.rect().width(), roi.rect().height());
    let mut data = vec![0.0; 3 * w * h];

    for y in 0..h {
        for x in 0..w {
            let u = (x as f32 + 0.5) / w as f32 * roi_w;
            let v = (y as f32 + 0.5) / h as f32 * roi_h;
            let (px, py) = roi.transform_out(u, v);
            let (px, py) = (px.floor(), py.floor());

            let color = if px >= 0.0
                && py >= 0.0
                && (px as u32) < image.width()
                && (py as u32) < image.height()
            {
                image.get(px as u32, py as u32)
            } else {
                Color::BLACK
            };

            for c in 0..3 {
                data[c * w * h + y * w + x] = f32::from(color[c]) / 255.0;
            }
        }
    }

    data
}

#[cfg(test)]
mod tests {
    use crate::image::Rect;

    use super::*;

    #[test]
    fn samples_axis_aligned_region() {
        let mut image = Image::new(4, 4);
        image.set(1, 2, Color::RED);
        let roi = RotatedRect::from(Rect::from_top_left(0.0, 0.0, 4.0, 4.0));

        let data = sample_nchw(&image, &roi, Resolution::new(4, 4));
        assert_eq!(data.len(), 3 * 16);
        // red channel at (1, 2)
        assert_eq!(data[2 * 4 + 1], 1.0);
        // green channel at (1, 2)
        assert_eq!(data[16 + 2 * 4 + 1], 0.0);
        assert_eq!(data.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn outside_of_image_is_black() {
        let image = Image::filled(4, 4, Color::WHITE);
        let roi = RotatedRect::from(Rect::from_top_left(-8.0, 0.0, 4.0, 4.0));

        let data = sample_nchw(&image, &roi, Resolution::new(2, 2));
        assert!(data.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn downsamples_region() {
        let image = Image::filled(8, 8, Color::WHITE);
        let roi = RotatedRect::from(Rect::from_top_left(0.0, 0.0, 8.0, 8.0));

        let data = sample_nchw(&image, &roi, Resolution::new(2, 2));
        assert!(data.iter().all(|v| *v == 1.0));
    }
}
