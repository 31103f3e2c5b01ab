use cx_data_client::RawBlock;
use cx_primitives::{Block, Height};


/// Consecutive delivered blocks handed to sinks as one write
#[derive(Debug, Clone)]
pub struct Pack {
    blocks: Vec<RawBlock>
}


impl Pack {
    pub fn new(blocks: Vec<RawBlock>) -> Self {
        debug_assert!(!blocks.is_empty(), "pack can't be empty");
        debug_assert!(blocks.windows(2).all(|w| w[0].height() < w[1].height()));
        Self { blocks }
    }

    pub fn blocks(&self) -> &[RawBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn last_block(&self) -> &RawBlock {
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn first_height(&self) -> Height {
        self.blocks[0].height()
    }

    pub fn last_height(&self) -> Height {
        self.last_block().height()
    }

    pub fn heights(&self) -> impl Iterator<Item = Height> + '_ {
        self.blocks.iter().map(|b| b.height())
    }
}
