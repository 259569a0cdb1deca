// VST2 plugin wrapping one looper instance. Instances loaded into the same
// host process join the default sync group and record together.
//
// Following: https://vaporsoft.net/creating-an-audio-plugin-with-rust-vst/

#[cfg(feature = "looper_vst")]
#[macro_use]
extern crate vst;

#[cfg(feature = "looper_vst")]
mod plugin {
    use std::sync::Arc;

    use log::*;
    use vst::api::{TimeInfo, TimeInfoFlags};
    use vst::buffer::AudioBuffer;
    use vst::host::Host;
    use vst::plugin::{Category, HostCallback, Info, Plugin, PluginParameters};
    use vst::util::AtomicFloat;

    use looper::{Config, LooperProcessor, ParamDispatch, ParamId, Sample, TransportInfo, Volume, NUM_PARAMS};

    type VstSample = f32;

    // Frames handed to the looper at once. Larger host blocks are split.
    const MAX_BLOCK: usize = 4096;

    // 'LpBk'
    const UNIQUE_ID: i32 = 0x4c70_426b;
    const VENDOR: &str = "Looper Project";

    /// Parameter values as last set by the host. Read by the audio thread
    /// once per block.
    struct LooperParameters {
        values: Vec<AtomicFloat>,
    }

    impl LooperParameters {
        fn new() -> Self {
            LooperParameters {
                values: ParamId::all().map(|id| AtomicFloat::new(id.default_value())).collect(),
            }
        }

        fn id(index: i32) -> Option<ParamId> {
            if index < 0 {
                return None;
            }
            ParamId::from_index(index as usize)
        }
    }

    impl PluginParameters for LooperParameters {
        fn get_parameter(&self, index: i32) -> f32 {
            match Self::id(index) {
                Some(id) => self.values[id.index()].get(),
                None => 0.0,
            }
        }

        fn set_parameter(&self, index: i32, value: f32) {
            if let Some(id) = Self::id(index) {
                self.values[id.index()].set(value);
            }
        }

        fn get_parameter_name(&self, index: i32) -> String {
            Self::id(index).map_or_else(String::new, |id| id.label())
        }

        fn get_parameter_text(&self, index: i32) -> String {
            match Self::id(index) {
                Some(ParamId::Volume(_)) => Volume::new(self.get_parameter(index)).to_string(),
                Some(_) => if self.get_parameter(index) >= 0.5 { "On".to_string() } else { "Off".to_string() },
                None => String::new(),
            }
        }

        fn can_be_automated(&self, index: i32) -> bool {
            Self::id(index).is_some()
        }
    }

    pub struct LooperVst {
        host: HostCallback,
        processor: LooperProcessor,
        dispatch: ParamDispatch,
        params: Arc<LooperParameters>,
        silence: Vec<Sample>,
        out_l: Vec<Sample>,
        out_r: Vec<Sample>,
    }

    impl LooperVst {
        fn with_host(host: HostCallback) -> Self {
            LooperVst {
                host,
                processor: LooperProcessor::new(Config::default()),
                dispatch: ParamDispatch::new(),
                params: Arc::new(LooperParameters::new()),
                silence: vec![0.0; MAX_BLOCK],
                out_l: vec![0.0; MAX_BLOCK],
                out_r: vec![0.0; MAX_BLOCK],
            }
        }

        /// Hand any parameter changes made since the last block to the looper.
        fn apply_parameters(self: &mut Self) {
            for id in ParamId::all() {
                let value = self.params.values[id.index()].get();
                if let Err(error) = self.dispatch.dispatch(&mut self.processor, id, value) {
                    warn!("{}: {}", id, error);
                }
            }
        }

        fn transport(self: &Self) -> Option<TransportInfo> {
            let mask = (TimeInfoFlags::TEMPO_VALID | TimeInfoFlags::TRANSPORT_PLAYING).bits();
            self.host.get_time_info(mask).map(|info: TimeInfo| {
                let flags = TimeInfoFlags::from_bits_truncate(info.flags);
                TransportInfo {
                    is_playing: flags.contains(TimeInfoFlags::TRANSPORT_PLAYING),
                    bpm: if flags.contains(TimeInfoFlags::TEMPO_VALID) { Some(info.tempo) } else { None },
                    sample_position: Some(info.sample_pos as i64),
                }
            })
        }
    }

    impl Default for LooperVst {
        fn default() -> Self {
            LooperVst::with_host(HostCallback::default())
        }
    }

    impl Plugin for LooperVst {
        fn new(host: HostCallback) -> Self {
            LooperVst::with_host(host)
        }

        fn get_info(&self) -> Info {
            Info {
                name: "Looper".to_string(),
                vendor: VENDOR.to_string(),
                unique_id: UNIQUE_ID,
                inputs: 2,
                outputs: 2,
                parameters: NUM_PARAMS as i32,
                version: 1,
                category: Category::Effect,
                ..Default::default()
            }
        }

        fn set_sample_rate(&mut self, rate: f32) {
            info!("Host sample rate: {}", rate);
            self.processor.set_sample_rate(rate as f64);
        }

        fn get_parameter_object(&mut self) -> Arc<dyn PluginParameters> {
            Arc::clone(&self.params) as Arc<dyn PluginParameters>
        }

        fn process(&mut self, buffer: &mut AudioBuffer<VstSample>) {
            self.apply_parameters();

            let mut transport = self.transport();
            let frames = buffer.samples();
            let (inputs, mut outputs) = buffer.split();

            let mut start = 0;
            while start < frames {
                let n = MAX_BLOCK.min(frames - start);
                let in_l = if inputs.len() > 0 { &inputs.get(0)[start..start + n] } else { &self.silence[..n] };
                let in_r = if inputs.len() > 1 { &inputs.get(1)[start..start + n] } else { in_l };

                self.processor.process_block([in_l, in_r],
                                             [&mut self.out_l[..n], &mut self.out_r[..n]],
                                             transport.as_ref());

                for channel in 0..outputs.len() {
                    let rendered = if channel % 2 == 0 { &self.out_l[..n] } else { &self.out_r[..n] };
                    outputs.get_mut(channel)[start..start + n].copy_from_slice(rendered);
                }

                if let Some(info) = transport.as_mut() {
                    info.sample_position = info.sample_position.map(|p| p + n as i64);
                }
                start += n;
            }
        }
    }

}

#[cfg(feature = "looper_vst")]
plugin_main!(plugin::LooperVst);
