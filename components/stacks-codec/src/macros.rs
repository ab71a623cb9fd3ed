/// Define a "u8" enum
///  gives you a from_u8(u8) -> Option<Self> function
macro_rules! define_u8_enum {
    ($(#[$outer:meta])*
     $Name:ident {
         $(
             $(#[$inner:meta])*
             $Variant:ident = $Val:literal),+
     }) =>
    {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash)]
        #[repr(u8)]
        $(#[$outer])*
        pub enum $Name {
            $(  $(#[$inner])*
                $Variant = $Val),*,
        }
        impl $Name {
            /// All members of the enum
            pub const ALL: &'static [$Name] = &[$($Name::$Variant),*];

            /// Return the u8 representation of the variant
            pub fn to_u8(&self) -> u8 {
                match self {
                    $(
                        $Name::$Variant => $Val,
                    )*
                }
            }

            /// Returns Some and the variant if `v` is a u8 corresponding to a variant in this enum.
            /// Returns None otherwise
            pub fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $(
                        v if v == $Name::$Variant as u8 => Some($Name::$Variant),
                    )*
                    _ => None
                }
            }
        }
    }
}

/// Fixed-size byte array newtypes (hashes, signatures, proofs)
macro_rules! impl_byte_array_newtype {
    ($thing:ident, $len:expr) => {
        impl $thing {
            /// Instantiates from a slice of bytes, `None` if the length is off
            pub fn from_bytes(inp: &[u8]) -> Option<$thing> {
                if inp.len() != $len {
                    return None;
                }
                let mut ret = [0u8; $len];
                ret.copy_from_slice(inp);
                Some($thing(ret))
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(&self.0[..])
            }
        }
    };
}

macro_rules! impl_array_hexstring_fmt {
    ($thing:ident) => {
        impl std::fmt::Debug for $thing {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", hex::encode(&self.0[..]))
            }
        }

        impl std::fmt::Display for $thing {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", hex::encode(&self.0[..]))
            }
        }
    };
}

macro_rules! impl_byte_array_message_codec {
    ($thing:ident, $len:expr) => {
        impl ::clarity::codec::StacksMessageCodec for $thing {
            fn consensus_serialize<W: std::io::Write>(
                &self,
                fd: &mut W,
            ) -> Result<(), ::clarity::codec::Error> {
                fd.write_all(&self.0[..])
                    .map_err(::clarity::codec::Error::WriteError)
            }
            fn consensus_deserialize<R: std::io::Read>(
                fd: &mut R,
            ) -> Result<$thing, ::clarity::codec::Error> {
                let mut buf = [0u8; ($len as usize)];
                fd.read_exact(&mut buf)
                    .map_err(::clarity::codec::Error::ReadError)?;
                Ok($thing(buf))
            }
        }
    };
}
