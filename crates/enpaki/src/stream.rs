//! Pull-driven production of the artifact
//!
//! A [`BundleStream`] yields the header, one chunk per module and the footer. Work only
//! happens when a chunk is pulled: pulling a module chunk processes exactly one pending
//! location. Through [`io::Read`] a new chunk is produced only after the previous one has
//! been consumed completely, so a slow writer throttles discovery.

use std::io;

use log::{debug, trace};

use crate::{
    code_generator::CodeGenerator,
    error::BundleError,
    graph_builder::{GraphBuilder, UnresolvedReference},
    identity::ModuleIdentity,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Modules,
    Footer,
    Done,
}

/// Summary of a finished bundling operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    /// Identities in the order their definitions were written
    pub modules: Vec<ModuleIdentity>,
    /// References left unresolved under the collect policy
    pub unresolved: Vec<UnresolvedReference>,
    /// Groups of modules that reference each other circularly
    pub circular_groups: Vec<Vec<ModuleIdentity>>,
    /// Distinct module-to-module references that were rewritten
    pub dependency_count: usize,
}

#[derive(Debug)]
pub struct BundleStream {
    builder: GraphBuilder,
    generator: CodeGenerator,
    phase: Phase,
    modules: Vec<ModuleIdentity>,
    /// Chunk being handed out through `io::Read`
    buffer: Vec<u8>,
    position: usize,
}

impl BundleStream {
    pub fn new(builder: GraphBuilder, generator: CodeGenerator) -> Self {
        Self {
            builder,
            generator,
            phase: Phase::Header,
            modules: Vec::new(),
            buffer: Vec::new(),
            position: 0,
        }
    }

    /// Produce the next chunk of the artifact, or `None` once the footer was produced
    ///
    /// After an error the stream is finished and every further pull returns `None`.
    pub fn next_chunk(&mut self) -> Result<Option<String>, BundleError> {
        loop {
            match self.phase {
                Phase::Header => {
                    trace!("Writing bundle header for {}", self.generator.entry());
                    self.phase = Phase::Modules;
                    return Ok(Some(self.generator.bundle_header()));
                }
                Phase::Modules => match self.builder.next_record() {
                    Ok(Some(record)) => {
                        let chunk = self
                            .generator
                            .wrap_module(&record.identity, &record.rewritten_source);
                        self.modules.push(record.identity);
                        return Ok(Some(chunk));
                    }
                    Ok(None) => self.phase = Phase::Footer,
                    Err(err) => {
                        self.phase = Phase::Done;
                        return Err(err);
                    }
                },
                Phase::Footer => {
                    let graph = self.builder.graph();
                    debug!(
                        "Bundled {} modules with {} references between them",
                        graph.module_count(),
                        graph.dependency_count()
                    );
                    self.phase = Phase::Done;
                    return Ok(Some(self.generator.bundle_footer()));
                }
                Phase::Done => return Ok(None),
            }
        }
    }

    /// Check if the footer was produced or the stream stopped on an error
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    /// Consume the stream and report what was bundled
    pub fn finish(self) -> BundleReport {
        BundleReport {
            circular_groups: self.builder.graph().circular_groups(),
            unresolved: self.builder.errors().to_vec(),
            dependency_count: self.builder.graph().dependency_count(),
            modules: self.modules,
        }
    }
}

impl Iterator for BundleStream {
    type Item = Result<String, BundleError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

impl std::iter::FusedIterator for BundleStream {}

impl io::Read for BundleStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.position >= self.buffer.len() {
            match self.next_chunk() {
                Ok(Some(chunk)) => {
                    self.buffer = chunk.into_bytes();
                    self.position = 0;
                }
                Ok(None) => return Ok(0),
                Err(err) => return Err(io::Error::other(err)),
            }
        }

        let available = &self.buffer[self.position..];
        let count = available.len().min(buf.len());
        buf[..count].copy_from_slice(&available[..count]);
        self.position += count;
        Ok(count)
    }
}
