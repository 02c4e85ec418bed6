//! (De)serialization utils.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{
    de::{DeserializeOwned, Error as DeError, SeqAccess, Unexpected, Visitor},
    ser::SerializeSeq,
    Deserialize, Deserializer, Serialize, Serializer,
};
use zeroize::Zeroizing;

use core::{fmt, marker::PhantomData};

use crate::{commitment::Opening, group::Group, PublicKey, SecretKey};

fn serialize_bytes<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    if serializer.is_human_readable() {
        serializer.serialize_str(&Base64UrlUnpadded::encode_string(value))
    } else {
        serializer.serialize_bytes(value)
    }
}

fn deserialize_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    struct Base64Visitor;

    impl Visitor<'_> for Base64Visitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("base64url-encoded data")
        }

        fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
            Base64UrlUnpadded::decode_vec(value)
                .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
        }

        fn visit_bytes<E: DeError>(self, value: &[u8]) -> Result<Self::Value, E> {
            Ok(value.to_vec())
        }

        fn visit_byte_buf<E: DeError>(self, value: Vec<u8>) -> Result<Self::Value, E> {
            Ok(value)
        }
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("byte buffer")
        }

        fn visit_bytes<E: DeError>(self, value: &[u8]) -> Result<Self::Value, E> {
            Ok(value.to_vec())
        }

        fn visit_byte_buf<E: DeError>(self, value: Vec<u8>) -> Result<Self::Value, E> {
            Ok(value)
        }

        // Some binary formats (e.g., `bincode`) encode byte buffers as sequences.
        fn visit_seq<S>(self, mut access: S) -> Result<Self::Value, S::Error>
        where
            S: SeqAccess<'de>,
        {
            let mut bytes = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some(byte) = access.next_element::<u8>()? {
                bytes.push(byte);
            }
            Ok(bytes)
        }
    }

    if deserializer.is_human_readable() {
        deserializer.deserialize_str(Base64Visitor)
    } else {
        deserializer.deserialize_bytes(BytesVisitor)
    }
}

fn check_len<E: DeError>(actual: usize, expected: usize) -> Result<(), E> {
    if actual == expected {
        Ok(())
    } else {
        let expected_len = expected.to_string();
        Err(E::invalid_length(actual, &expected_len.as_str()))
    }
}

impl<G: Group> Serialize for PublicKey<G> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_bytes(self.as_bytes(), serializer)
    }
}

impl<'de, G: Group> Deserialize<'de> for PublicKey<G> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = deserialize_bytes(deserializer)?;
        Self::from_bytes(&bytes).map_err(D::Error::custom)
    }
}

impl<G: Group> Serialize for SecretKey<G> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ScalarHelper::<G>::serialize(self.expose_scalar(), serializer)
    }
}

impl<'de, G: Group> Deserialize<'de> for SecretKey<G> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        ScalarHelper::<G>::deserialize(deserializer).map(SecretKey::new)
    }
}

impl Serialize for Opening {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_bytes(self.as_bytes(), serializer)
    }
}

impl<'de> Deserialize<'de> for Opening {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Zeroizing::new(deserialize_bytes(deserializer)?);
        let bytes: [u8; crate::commitment::RANDOM_BYTES] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| D::Error::invalid_length(bytes.len(), &"32"))?;
        Ok(Self::from_bytes(bytes))
    }
}

/// Helper type to (de)serialize fixed-size byte arrays.
pub(crate) struct BytesHelper<const N: usize>(());

impl<const N: usize> BytesHelper<N> {
    pub fn serialize<S>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serialize_bytes(bytes, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = deserialize_bytes(deserializer)?;
        check_len::<D::Error>(bytes.len(), N)?;
        let mut output = [0_u8; N];
        output.copy_from_slice(&bytes);
        Ok(output)
    }
}

/// Helper type to deserialize scalars.
#[derive(Debug)]
pub(crate) struct ScalarHelper<G: Group>(G::Scalar);

impl<G: Group> ScalarHelper<G> {
    pub fn serialize<S>(scalar: &G::Scalar, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut bytes = Zeroizing::new(vec![0_u8; G::SCALAR_SIZE]);
        G::serialize_scalar(scalar, &mut bytes);
        serialize_bytes(&bytes, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<G::Scalar, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = Zeroizing::new(deserialize_bytes(deserializer)?);
        check_len::<D::Error>(bytes.len(), G::SCALAR_SIZE)?;
        G::deserialize_scalar(&bytes)
            .ok_or_else(|| D::Error::invalid_value(Unexpected::Other("bytes"), &"group scalar"))
    }
}

impl<'de, G: Group> Deserialize<'de> for ScalarHelper<G> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::deserialize(deserializer).map(Self)
    }
}

/// Helper type to deserialize group elements.
#[derive(Debug)]
pub(crate) struct ElementHelper<G: Group>(G::Element);

impl<G: Group> ElementHelper<G> {
    pub fn serialize<S>(element: &G::Element, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut bytes = vec![0_u8; G::ELEMENT_SIZE];
        G::serialize_element(element, &mut bytes);
        serialize_bytes(&bytes, serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<G::Element, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes = deserialize_bytes(deserializer)?;
        check_len::<D::Error>(bytes.len(), G::ELEMENT_SIZE)?;
        G::deserialize_element(&bytes)
            .ok_or_else(|| D::Error::invalid_value(Unexpected::Bytes(&bytes), &"group element"))
    }
}

impl<'de, G: Group> Deserialize<'de> for ElementHelper<G> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::deserialize(deserializer).map(Self)
    }
}

/// Common functionality for serialization helpers.
pub(crate) trait Helper: Serialize + DeserializeOwned {
    const PLURAL_DESCRIPTION: &'static str;
    type Target;

    fn from_target(target: &Self::Target) -> Self;
    fn into_target(self) -> Self::Target;
}

impl<G: Group> Serialize for ScalarHelper<G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Self::serialize(&self.0, serializer)
    }
}

impl<G: Group> Helper for ScalarHelper<G> {
    const PLURAL_DESCRIPTION: &'static str = "group scalars";
    type Target = G::Scalar;

    fn from_target(target: &Self::Target) -> Self {
        Self(*target)
    }

    fn into_target(self) -> Self::Target {
        self.0
    }
}

impl<G: Group> Serialize for ElementHelper<G> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        Self::serialize(&self.0, serializer)
    }
}

impl<G: Group> Helper for ElementHelper<G> {
    const PLURAL_DESCRIPTION: &'static str = "group elements";
    type Target = G::Element;

    fn from_target(target: &Self::Target) -> Self {
        Self(*target)
    }

    fn into_target(self) -> Self::Target {
        self.0
    }
}

/// Helper to (de)serialize vectors of scalars or elements that must contain at least
/// `MIN` items.
pub(crate) struct VecHelper<T, const MIN: usize>(PhantomData<T>);

impl<T: Helper, const MIN: usize> VecHelper<T, MIN> {
    fn new() -> Self {
        Self(PhantomData)
    }

    pub fn serialize<S>(values: &[T::Target], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        debug_assert!(values.len() >= MIN);
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&T::from_target(value))?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<T::Target>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(Self::new())
    }
}

impl<'de, T: Helper, const MIN: usize> Visitor<'de> for VecHelper<T, MIN> {
    type Value = Vec<T::Target>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "at least {MIN} {}", T::PLURAL_DESCRIPTION)
    }

    fn visit_seq<S>(self, mut access: S) -> Result<Self::Value, S::Error>
    where
        S: SeqAccess<'de>,
    {
        let mut values = if let Some(size) = access.size_hint() {
            if size < MIN {
                return Err(S::Error::invalid_length(size, &self));
            }
            Vec::with_capacity(size)
        } else {
            Vec::new()
        };

        while let Some(value) = access.next_element::<T>()? {
            values.push(value.into_target());
        }
        if values.len() >= MIN {
            Ok(values)
        } else {
            Err(S::Error::invalid_length(values.len(), &self))
        }
    }
}
