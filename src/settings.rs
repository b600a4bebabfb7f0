use crate::{
    engine::Svgd,
    error::Result,
    gradient::GradientProvider,
    kernel::{BandwidthRule, RbfKernel},
    optimizer::{Adam, AdamOptions},
};

/// Settings for the default SVGD engine: RBF kernel and Adam.
#[derive(Debug, Clone, Copy, Default)]
pub struct SvgdSettings {
    /// Settings for the Adam optimizer that applies the update direction.
    pub adam: AdamOptions,
    /// How the kernel bandwidth is chosen in every iteration.
    pub bandwidth: BandwidthRule,
}

impl SvgdSettings {
    pub fn validate(&self) -> Result<()> {
        self.adam.validate()?;
        self.bandwidth.validate()
    }
}

/// Create an engine with an RBF kernel and an Adam optimizer.
pub fn new_svgd<G: GradientProvider>(
    settings: SvgdSettings,
    provider: G,
) -> Result<Svgd<RbfKernel, G, Adam>> {
    settings.validate()?;
    let kernel = RbfKernel::new(settings.bandwidth)?;
    let optimizer = Adam::new(settings.adam)?;
    Ok(Svgd::new(kernel, provider, optimizer))
}
