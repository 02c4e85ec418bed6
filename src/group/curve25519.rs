use curve25519_dalek::{
    constants::{ED25519_BASEPOINT_POINT, ED25519_BASEPOINT_TABLE},
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
    traits::{Identity, IsIdentity, VartimeMultiscalarMul},
};
use rand_core::{CryptoRng, RngCore};

use crate::group::{ElementOps, Group, RandomBytesProvider, ScalarOps};

/// Group parameters based on Ed25519 points: the prime-order subgroup of Curve25519
/// generated by the Ed25519 base point, with points encoded as compressed Edwards `y`
/// coordinates.
///
/// Peers' key shares, encrypted contributions and candidates all arrive as untrusted
/// bytes, so every decoded point is checked to be torsion-free; a point with
/// a small-order component is rejected as if it were malformed. The check makes
/// decoding several times slower than with [`Ristretto`], which has no cofactor
/// and should be preferred unless candidates must be plain Ed25519 points
/// (in which case see [cofactor pitfalls]).
///
/// [`Ristretto`]: crate::group::Ristretto
/// [cofactor pitfalls]: https://ristretto.group/why_ristretto.html#pitfalls-of-a-cofactor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(docsrs, doc(cfg(feature = "curve25519-dalek")))]
pub struct Curve25519Subgroup(());

impl ScalarOps for Curve25519Subgroup {
    type Scalar = Scalar;

    const SCALAR_SIZE: usize = 32;

    fn generate_scalar<R: CryptoRng + RngCore>(rng: &mut R) -> Self::Scalar {
        wide_scalar(|bytes| rng.fill_bytes(bytes))
    }

    fn scalar_from_random_bytes(source: RandomBytesProvider<'_>) -> Self::Scalar {
        wide_scalar(|bytes| source.fill_bytes(bytes))
    }

    fn serialize_scalar(scalar: &Self::Scalar, buffer: &mut [u8]) {
        buffer.copy_from_slice(&scalar.to_bytes());
    }

    fn deserialize_scalar(buffer: &[u8]) -> Option<Self::Scalar> {
        let bytes: [u8; 32] = buffer.try_into().ok()?;
        Scalar::from_canonical_bytes(bytes).into()
    }
}

/// Reduces 64 uniform bytes modulo the group order, so that the bias is negligible.
pub(super) fn wide_scalar(fill: impl FnOnce(&mut [u8])) -> Scalar {
    let mut bytes = [0_u8; 64];
    fill(&mut bytes);
    Scalar::from_bytes_mod_order_wide(&bytes)
}

impl ElementOps for Curve25519Subgroup {
    type Element = EdwardsPoint;

    const ELEMENT_SIZE: usize = 32;

    fn identity() -> Self::Element {
        EdwardsPoint::identity()
    }

    fn is_identity(element: &Self::Element) -> bool {
        element.is_identity()
    }

    fn generator() -> Self::Element {
        ED25519_BASEPOINT_POINT
    }

    fn serialize_element(element: &Self::Element, buffer: &mut [u8]) {
        buffer.copy_from_slice(&element.compress().to_bytes());
    }

    fn deserialize_element(buffer: &[u8]) -> Option<Self::Element> {
        CompressedEdwardsY::from_slice(buffer)
            .ok()?
            .decompress()
            .filter(EdwardsPoint::is_torsion_free)
    }
}

impl Group for Curve25519Subgroup {
    fn mul_generator(k: &Scalar) -> Self::Element {
        k * ED25519_BASEPOINT_TABLE
    }

    fn vartime_mul_generator(k: &Scalar) -> Self::Element {
        EdwardsPoint::vartime_double_scalar_mul_basepoint(
            &Scalar::ZERO,
            &EdwardsPoint::identity(),
            k,
        )
    }

    fn vartime_double_mul_generator(
        k: &Scalar,
        k_element: Self::Element,
        r: &Scalar,
    ) -> Self::Element {
        EdwardsPoint::vartime_double_scalar_mul_basepoint(k, &k_element, r)
    }

    fn vartime_multi_mul<'a, I, J>(scalars: I, elements: J) -> Self::Element
    where
        I: IntoIterator<Item = &'a Self::Scalar>,
        J: IntoIterator<Item = Self::Element>,
    {
        EdwardsPoint::vartime_multiscalar_mul(scalars, elements)
    }
}
