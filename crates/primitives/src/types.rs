use std::fmt::{Display, Formatter};


pub type Height = i64;


#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct BlockRef {
    pub height: Height,
    pub hash: String
}


impl Display for BlockRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.height, self.hash)
    }
}


pub struct DisplayBlockRefOption<'a>(pub Option<&'a BlockRef>);


impl<'a> Display for DisplayBlockRefOption<'a> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(r) = self.0 {
            write!(f, "{}", r)
        } else {
            write!(f, "None")
        }
    }
}


pub trait Block {
    fn height(&self) -> Height;

    fn hash(&self) -> &str;

    fn parent_hash(&self) -> &str;

    /// Block time in unix seconds, if the chain reports one
    fn timestamp(&self) -> Option<i64> {
        None
    }

    #[inline]
    fn block_ref(&self) -> BlockRef {
        BlockRef {
            height: self.height(),
            hash: self.hash().to_string()
        }
    }
}


impl<'a, T: Block> Block for &'a T {
    #[inline]
    fn height(&self) -> Height {
        (*self).height()
    }

    #[inline]
    fn hash(&self) -> &str {
        (*self).hash()
    }

    #[inline]
    fn parent_hash(&self) -> &str {
        (*self).parent_hash()
    }

    #[inline]
    fn timestamp(&self) -> Option<i64> {
        (*self).timestamp()
    }
}
