use basalt_math::coset::Coset;
use basalt_math::field::ExtensionFieldElement;

use crate::errors::{ensure, Result};
use crate::fri::folder;

/// One FRI layer. A *real* layer holds its evaluation explicitly; a *proxy*
/// layer is defined by one folding step over its predecessor and is only
/// materialized on demand. Proxies may be chained; between two real layers
/// there is at least one proxy.
pub enum FriLayer {
    Real {
        domain: Coset,
        evaluation: Vec<ExtensionFieldElement>,
    },
    Proxy {
        domain: Coset,
        prev_layer: Box<FriLayer>,
        eval_point: ExtensionFieldElement,
    },
}

impl FriLayer {
    pub fn new_real(evaluation: Vec<ExtensionFieldElement>, domain: Coset) -> Result<Self> {
        ensure(evaluation.len() as u64 == domain.size(), || {
            "layer evaluation must cover the whole domain".to_string()
        })?;
        Ok(FriLayer::Real { domain, evaluation })
    }

    /// A proxy over `prev_layer`, halving its domain.
    pub fn new_proxy(prev_layer: FriLayer, eval_point: ExtensionFieldElement) -> Result<Self> {
        let domain = prev_layer.domain().fold(1)?;
        Ok(FriLayer::Proxy {
            domain,
            prev_layer: Box::new(prev_layer),
            eval_point,
        })
    }

    /// Materializes this layer into a real one.
    pub fn into_real(self) -> Result<Self> {
        match self {
            real @ FriLayer::Real { .. } => Ok(real),
            proxy @ FriLayer::Proxy { .. } => {
                let evaluation = proxy.get_layer()?;
                let domain = proxy.domain().clone();
                FriLayer::new_real(evaluation, domain)
            }
        }
    }

    pub fn domain(&self) -> &Coset {
        match self {
            FriLayer::Real { domain, .. } | FriLayer::Proxy { domain, .. } => domain,
        }
    }

    pub fn layer_size(&self) -> u64 {
        self.domain().size()
    }

    /// The full evaluation of this layer, applying pending folds.
    pub fn get_layer(&self) -> Result<Vec<ExtensionFieldElement>> {
        match self {
            FriLayer::Real { evaluation, .. } => Ok(evaluation.clone()),
            FriLayer::Proxy {
                prev_layer,
                eval_point,
                ..
            } => {
                let previous = prev_layer.get_layer()?;
                folder::compute_next_fri_layer(prev_layer.domain(), &previous, eval_point)
            }
        }
    }

    /// Reads specific indices. Only real layers serve point queries.
    pub fn eval_at_indices(&self, indices: &[u64]) -> Result<Vec<ExtensionFieldElement>> {
        match self {
            FriLayer::Real { evaluation, .. } => indices
                .iter()
                .map(|index| {
                    ensure(*index < evaluation.len() as u64, || {
                        "layer index out of range".to_string()
                    })?;
                    Ok(evaluation[*index as usize])
                })
                .collect(),
            FriLayer::Proxy { .. } => Err(crate::errors::StarkError::InvariantViolation(
                "proxy layers cannot serve point queries".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use basalt_math::field::element::random_element_vector;
    use basalt_math::field::{BaseFieldElement, FieldElement};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn proxy_chains_halve_the_domain() {
        let mut rng = StdRng::seed_from_u64(201);
        let domain = Coset::new(64, BaseFieldElement::one()).unwrap();
        let evaluation: Vec<ExtensionFieldElement> = random_element_vector(&mut rng, 64);
        let eval_point = ExtensionFieldElement::random(&mut rng);

        let layer0 = FriLayer::new_real(evaluation, domain).unwrap();
        let proxy1 = FriLayer::new_proxy(layer0, eval_point).unwrap();
        let proxy2 = FriLayer::new_proxy(proxy1, eval_point * eval_point).unwrap();
        assert_eq!(proxy2.layer_size(), 16);
        assert_eq!(proxy2.get_layer().unwrap().len(), 16);
    }

    #[test]
    fn proxies_refuse_point_queries() {
        let mut rng = StdRng::seed_from_u64(202);
        let domain = Coset::new(8, BaseFieldElement::one()).unwrap();
        let evaluation: Vec<ExtensionFieldElement> = random_element_vector(&mut rng, 8);
        let layer = FriLayer::new_real(evaluation.clone(), domain).unwrap();
        assert_eq!(layer.eval_at_indices(&[3]).unwrap(), vec![evaluation[3]]);

        let proxy =
            FriLayer::new_proxy(layer, ExtensionFieldElement::random(&mut rng)).unwrap();
        assert!(proxy.eval_at_indices(&[0]).is_err());
    }
}
