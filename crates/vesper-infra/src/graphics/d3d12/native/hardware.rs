// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The [`NativeDevice`] backed by `ID3D12Device` and DXGI.
//!
//! Every native object lives in a table keyed by the opaque handle the
//! backend holds. Recorded [`CommandList`]s are translated into one
//! `ID3D12GraphicsCommandList` per submission; allocators are recycled once
//! the internal submission fence shows the GPU is done with them.

use super::*;
use raw_window_handle::RawWindowHandle;
use std::collections::{HashMap, VecDeque};
use std::ffi::{c_void, CString};
use std::mem::ManuallyDrop;
use std::sync::{Mutex, MutexGuard};
use windows::core::{Interface, PCSTR};
use windows::Win32::Foundation::{BOOL, HANDLE, HWND, RECT};
use windows::Win32::Graphics::Direct3D::Fxc::{
    D3DCompile, D3DCOMPILE_ENABLE_STRICTNESS, D3DCOMPILE_OPTIMIZATION_LEVEL3,
};
use windows::Win32::Graphics::Direct3D::{
    ID3DBlob, D3D_FEATURE_LEVEL, D3D_FEATURE_LEVEL_11_0, D3D_FEATURE_LEVEL_11_1,
    D3D_FEATURE_LEVEL_12_0, D3D_FEATURE_LEVEL_12_1, D3D_PRIMITIVE_TOPOLOGY, D3D_SHADER_MACRO,
};
use windows::Win32::Graphics::Direct3D12::*;
use windows::Win32::Graphics::Dxgi::Common::*;
use windows::Win32::Graphics::Dxgi::*;

struct MappedResource {
    resource: ID3D12Resource,
    /// Persistent mapping of upload and readback heaps, null otherwise.
    mapped: *mut u8,
    size: u64,
}

struct NativeFence {
    fence: ID3D12Fence,
    last_signaled: u64,
}

struct NativeSwapchain {
    chain: IDXGISwapChain3,
    flags: DXGI_SWAP_CHAIN_FLAG,
}

#[derive(Default)]
struct Objects {
    next_id: u64,
    resources: HashMap<u64, MappedResource>,
    heaps: HashMap<u64, ID3D12DescriptorHeap>,
    root_signatures: HashMap<u64, ID3D12RootSignature>,
    pipelines: HashMap<u64, ID3D12PipelineState>,
    fences: HashMap<u64, NativeFence>,
    swapchains: HashMap<u64, NativeSwapchain>,
}

impl Objects {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn resource(&self, handle: ResourceHandle) -> Result<&ID3D12Resource, NativeError> {
        self.resources
            .get(&handle.0)
            .map(|r| &r.resource)
            .ok_or(NativeError::InvalidHandle)
    }
}

struct Submission {
    list: ID3D12GraphicsCommandList,
    /// Allocators paired with the submission value that last used them.
    allocators: VecDeque<(ID3D12CommandAllocator, u64)>,
    fence: ID3D12Fence,
    value: u64,
}

/// A hardware D3D12 device with a single direct queue.
pub struct WindowsDevice {
    factory: IDXGIFactory4,
    device: ID3D12Device,
    queue: ID3D12CommandQueue,
    info: AdapterInfo,
    tearing: bool,
    objects: Mutex<Objects>,
    submission: Mutex<Submission>,
}

// SAFETY: D3D12 devices, queues and the objects they create are free-threaded.
// Command list recording and every handle table are serialized by the mutexes,
// and mapped pointers are only dereferenced while `objects` is locked.
unsafe impl Send for WindowsDevice {}
unsafe impl Sync for WindowsDevice {}

impl fmt::Debug for WindowsDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowsDevice")
            .field("adapter", &self.info.description)
            .field("feature_level", &self.info.feature_level)
            .field("tearing", &self.tearing)
            .finish_non_exhaustive()
    }
}

fn creation_failed(what: &'static str) -> impl Fn(windows::core::Error) -> NativeError {
    move |err| NativeError::CreationFailed(format!("{what}: {err}"))
}

/// A non-owning COM reference for descriptor structs that hold `ManuallyDrop<Option<T>>`.
fn borrowed<T: Interface>(object: &T) -> ManuallyDrop<Option<T>> {
    // SAFETY: `T` and `Option<T>` share the non-null pointer layout, and the
    // `ManuallyDrop` wrapper guarantees the borrowed reference is never released.
    unsafe { std::mem::transmute_copy(object) }
}

fn blob_bytes(blob: &ID3DBlob) -> Vec<u8> {
    // SAFETY: the blob owns `GetBufferSize` bytes at `GetBufferPointer`.
    unsafe {
        std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize())
            .to_vec()
    }
}

fn dxgi(format: DxgiFormat) -> DXGI_FORMAT {
    DXGI_FORMAT(format as i32)
}

fn cpu(descriptor: CpuDescriptor) -> D3D12_CPU_DESCRIPTOR_HANDLE {
    D3D12_CPU_DESCRIPTOR_HANDLE {
        ptr: descriptor.0 as usize,
    }
}

fn gpu(descriptor: GpuDescriptor) -> D3D12_GPU_DESCRIPTOR_HANDLE {
    D3D12_GPU_DESCRIPTOR_HANDLE { ptr: descriptor.0 }
}

fn states(states: ResourceStates) -> D3D12_RESOURCE_STATES {
    D3D12_RESOURCE_STATES(states.bits() as i32)
}

fn heap_kind(kind: DescriptorHeapKind) -> D3D12_DESCRIPTOR_HEAP_TYPE {
    D3D12_DESCRIPTOR_HEAP_TYPE(kind as i32)
}

fn sampler_desc(desc: &NativeSamplerDesc) -> D3D12_SAMPLER_DESC {
    D3D12_SAMPLER_DESC {
        Filter: D3D12_FILTER(desc.filter.0 as i32),
        AddressU: D3D12_TEXTURE_ADDRESS_MODE(desc.address_u as i32),
        AddressV: D3D12_TEXTURE_ADDRESS_MODE(desc.address_v as i32),
        AddressW: D3D12_TEXTURE_ADDRESS_MODE(desc.address_w as i32),
        MipLODBias: desc.mip_lod_bias,
        MaxAnisotropy: desc.max_anisotropy,
        ComparisonFunc: D3D12_COMPARISON_FUNC(desc.comparison as i32),
        BorderColor: desc.border_color,
        MinLOD: desc.min_lod,
        MaxLOD: desc.max_lod,
    }
}

fn static_border(color: [f32; 4]) -> D3D12_STATIC_BORDER_COLOR {
    match color {
        [_, _, _, a] if a == 0.0 => D3D12_STATIC_BORDER_COLOR_TRANSPARENT_BLACK,
        [r, _, _, _] if r == 0.0 => D3D12_STATIC_BORDER_COLOR_OPAQUE_BLACK,
        _ => D3D12_STATIC_BORDER_COLOR_OPAQUE_WHITE,
    }
}

fn stencil_face(face: &NativeStencilFace) -> D3D12_DEPTH_STENCILOP_DESC {
    D3D12_DEPTH_STENCILOP_DESC {
        StencilFailOp: D3D12_STENCIL_OP(face.fail as i32),
        StencilDepthFailOp: D3D12_STENCIL_OP(face.depth_fail as i32),
        StencilPassOp: D3D12_STENCIL_OP(face.pass as i32),
        StencilFunc: D3D12_COMPARISON_FUNC(face.func as i32),
    }
}

fn copy_location(
    objects: &Objects,
    location: &TextureCopyLocation,
) -> Result<D3D12_TEXTURE_COPY_LOCATION, NativeError> {
    Ok(match *location {
        TextureCopyLocation::Subresource { resource, index } => D3D12_TEXTURE_COPY_LOCATION {
            pResource: borrowed(objects.resource(resource)?),
            Type: D3D12_TEXTURE_COPY_TYPE_SUBRESOURCE_INDEX,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                SubresourceIndex: index,
            },
        },
        TextureCopyLocation::Footprint {
            resource,
            footprint,
        } => D3D12_TEXTURE_COPY_LOCATION {
            pResource: borrowed(objects.resource(resource)?),
            Type: D3D12_TEXTURE_COPY_TYPE_PLACED_FOOTPRINT,
            Anonymous: D3D12_TEXTURE_COPY_LOCATION_0 {
                PlacedFootprint: D3D12_PLACED_SUBRESOURCE_FOOTPRINT {
                    Offset: footprint.offset,
                    Footprint: D3D12_SUBRESOURCE_FOOTPRINT {
                        Format: dxgi(footprint.format),
                        Width: footprint.width,
                        Height: footprint.height,
                        Depth: 1,
                        RowPitch: footprint.row_pitch,
                    },
                },
            },
        },
    })
}

fn barrier(objects: &Objects, barrier: &Barrier) -> Result<D3D12_RESOURCE_BARRIER, NativeError> {
    Ok(match *barrier {
        Barrier::Transition {
            resource,
            subresource,
            before,
            after,
        } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_TRANSITION,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                Transition: ManuallyDrop::new(D3D12_RESOURCE_TRANSITION_BARRIER {
                    pResource: borrowed(objects.resource(resource)?),
                    Subresource: subresource,
                    StateBefore: states(before),
                    StateAfter: states(after),
                }),
            },
        },
        Barrier::Uav { resource } => D3D12_RESOURCE_BARRIER {
            Type: D3D12_RESOURCE_BARRIER_TYPE_UAV,
            Flags: D3D12_RESOURCE_BARRIER_FLAG_NONE,
            Anonymous: D3D12_RESOURCE_BARRIER_0 {
                UAV: ManuallyDrop::new(D3D12_RESOURCE_UAV_BARRIER {
                    pResource: borrowed(objects.resource(resource)?),
                }),
            },
        },
    })
}

/// Picks the first hardware adapter that can create a feature level 11.0 device.
fn hardware_adapter(factory: &IDXGIFactory4) -> Result<IDXGIAdapter1, NativeError> {
    for index in 0.. {
        // SAFETY: enumeration stops at the first error (DXGI_ERROR_NOT_FOUND).
        let Ok(adapter) = (unsafe { factory.EnumAdapters1(index) }) else {
            break;
        };
        let Ok(desc) = (unsafe { adapter.GetDesc1() }) else {
            continue;
        };
        if (desc.Flags & DXGI_ADAPTER_FLAG_SOFTWARE.0 as u32) != 0 {
            continue;
        }
        let probe = unsafe {
            D3D12CreateDevice(
                &adapter,
                D3D_FEATURE_LEVEL_11_0,
                std::ptr::null_mut::<Option<ID3D12Device>>(),
            )
        };
        if probe.is_ok() {
            return Ok(adapter);
        }
    }
    Err(NativeError::CreationFailed(
        "no hardware adapter supports Direct3D 12".to_string(),
    ))
}

fn max_feature_level(device: &ID3D12Device) -> &'static str {
    let requested = [
        D3D_FEATURE_LEVEL_11_0,
        D3D_FEATURE_LEVEL_11_1,
        D3D_FEATURE_LEVEL_12_0,
        D3D_FEATURE_LEVEL_12_1,
    ];
    let mut levels = D3D12_FEATURE_DATA_FEATURE_LEVELS {
        NumFeatureLevels: requested.len() as u32,
        pFeatureLevelsRequested: requested.as_ptr(),
        MaxSupportedFeatureLevel: D3D_FEATURE_LEVEL::default(),
    };
    let queried = unsafe {
        device.CheckFeatureSupport(
            D3D12_FEATURE_FEATURE_LEVELS,
            &mut levels as *mut _ as *mut c_void,
            std::mem::size_of::<D3D12_FEATURE_DATA_FEATURE_LEVELS>() as u32,
        )
    };
    if queried.is_err() {
        return "11.0";
    }
    match levels.MaxSupportedFeatureLevel {
        D3D_FEATURE_LEVEL_12_1 => "12.1",
        D3D_FEATURE_LEVEL_12_0 => "12.0",
        D3D_FEATURE_LEVEL_11_1 => "11.1",
        _ => "11.0",
    }
}

fn tearing_supported(factory: &IDXGIFactory4) -> bool {
    let Ok(factory) = factory.cast::<IDXGIFactory5>() else {
        return false;
    };
    let mut allow = BOOL::default();
    let queried = unsafe {
        factory.CheckFeatureSupport(
            DXGI_FEATURE_PRESENT_ALLOW_TEARING,
            &mut allow as *mut _ as *mut c_void,
            std::mem::size_of::<BOOL>() as u32,
        )
    };
    queried.is_ok() && allow.as_bool()
}

impl WindowsDevice {
    /// Creates the device, its direct queue and the submission list on the
    /// first hardware adapter.
    ///
    /// ## Errors
    /// * `NativeError::CreationFailed` - If no adapter supports D3D12 or an object cannot be created.
    pub fn new() -> Result<Self, NativeError> {
        let factory: IDXGIFactory4 = unsafe { CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0)) }
            .map_err(creation_failed("DXGI factory"))?;
        let adapter = hardware_adapter(&factory)?;
        let desc = unsafe { adapter.GetDesc1() }.map_err(creation_failed("adapter description"))?;

        let mut device: Option<ID3D12Device> = None;
        unsafe { D3D12CreateDevice(&adapter, D3D_FEATURE_LEVEL_11_0, &mut device) }
            .map_err(creation_failed("D3D12 device"))?;
        let device = device.ok_or_else(|| NativeError::CreationFailed("D3D12 device".into()))?;

        let queue: ID3D12CommandQueue = unsafe {
            device.CreateCommandQueue(&D3D12_COMMAND_QUEUE_DESC {
                Type: D3D12_COMMAND_LIST_TYPE_DIRECT,
                ..Default::default()
            })
        }
        .map_err(creation_failed("command queue"))?;
        let allocator: ID3D12CommandAllocator =
            unsafe { device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .map_err(creation_failed("command allocator"))?;
        let list: ID3D12GraphicsCommandList = unsafe {
            device.CreateCommandList(0, D3D12_COMMAND_LIST_TYPE_DIRECT, &allocator, None)
        }
        .map_err(creation_failed("command list"))?;
        unsafe { list.Close() }.map_err(creation_failed("command list"))?;
        let fence: ID3D12Fence = unsafe { device.CreateFence(0, D3D12_FENCE_FLAG_NONE) }
            .map_err(creation_failed("submission fence"))?;

        let name_len = desc.Description.iter().position(|&c| c == 0).unwrap_or(desc.Description.len());
        let info = AdapterInfo {
            vendor_id: desc.VendorId,
            description: String::from_utf16_lossy(&desc.Description[..name_len]),
            feature_level: max_feature_level(&device).to_string(),
        };
        let tearing = tearing_supported(&factory);
        log::info!(
            "WindowsDevice: using '{}' (feature level {}, tearing: {tearing})",
            info.description,
            info.feature_level
        );

        Ok(Self {
            factory,
            device,
            queue,
            info,
            tearing,
            objects: Mutex::new(Objects::default()),
            submission: Mutex::new(Submission {
                list,
                allocators: VecDeque::from([(allocator, 0)]),
                fence,
                value: 0,
            }),
        })
    }

    fn objects(&self) -> MutexGuard<'_, Objects> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn submission(&self) -> MutexGuard<'_, Submission> {
        self.submission.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Maps a failed queue or swapchain call, reporting device removal.
    fn device_error(&self, err: windows::core::Error) -> NativeError {
        let code = err.code();
        if code == DXGI_ERROR_DEVICE_REMOVED || code == DXGI_ERROR_DEVICE_RESET {
            let reason = match unsafe { self.device.GetDeviceRemovedReason() } {
                Ok(()) => err.to_string(),
                Err(removed) => removed.to_string(),
            };
            NativeError::DeviceRemoved { reason }
        } else {
            NativeError::Other(err.to_string())
        }
    }

    fn register_resource(&self, resource: ID3D12Resource, heap: HeapType, size: u64) -> Result<ResourceHandle, NativeError> {
        let mut mapped: *mut c_void = std::ptr::null_mut();
        if heap != HeapType::Default {
            unsafe { resource.Map(0, None, Some(&mut mapped)) }
                .map_err(creation_failed("resource mapping"))?;
        }
        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.resources.insert(
            id,
            MappedResource {
                resource,
                mapped: mapped as *mut u8,
                size,
            },
        );
        Ok(ResourceHandle(id))
    }

    /// Translates one recorded command into the native list.
    fn record(
        &self,
        list: &ID3D12GraphicsCommandList,
        objects: &Objects,
        command: &NativeCommand,
    ) -> Result<(), NativeError> {
        // SAFETY: every referenced object is kept alive by `objects` for the
        // duration of the call, and the list is open.
        unsafe {
            match command {
                NativeCommand::ResourceBarrier(barriers) => {
                    let native = barriers
                        .iter()
                        .map(|b| barrier(objects, b))
                        .collect::<Result<Vec<_>, _>>()?;
                    list.ResourceBarrier(&native);
                }
                NativeCommand::CopyBufferRegion {
                    dst,
                    dst_offset,
                    src,
                    src_offset,
                    size,
                } => list.CopyBufferRegion(
                    objects.resource(*dst)?,
                    *dst_offset,
                    objects.resource(*src)?,
                    *src_offset,
                    *size,
                ),
                NativeCommand::CopyTextureRegion {
                    dst,
                    dst_x,
                    dst_y,
                    src,
                } => {
                    let dst = copy_location(objects, dst)?;
                    let src = copy_location(objects, src)?;
                    list.CopyTextureRegion(&dst, *dst_x, *dst_y, 0, &src, None);
                }
                NativeCommand::CopyResource { dst, src } => {
                    list.CopyResource(objects.resource(*dst)?, objects.resource(*src)?)
                }
                NativeCommand::SetDescriptorHeaps(heaps) => {
                    let native = heaps
                        .iter()
                        .map(|h| objects.heaps.get(&h.0).cloned().ok_or(NativeError::InvalidHandle).map(Some))
                        .collect::<Result<Vec<_>, _>>()?;
                    list.SetDescriptorHeaps(&native);
                }
                NativeCommand::SetGraphicsRootSignature(root) => {
                    let root = objects.root_signatures.get(&root.0).ok_or(NativeError::InvalidHandle)?;
                    list.SetGraphicsRootSignature(root);
                }
                NativeCommand::SetComputeRootSignature(root) => {
                    let root = objects.root_signatures.get(&root.0).ok_or(NativeError::InvalidHandle)?;
                    list.SetComputeRootSignature(root);
                }
                NativeCommand::SetPipelineState(pipeline) => {
                    let pipeline = objects.pipelines.get(&pipeline.0).ok_or(NativeError::InvalidHandle)?;
                    list.SetPipelineState(pipeline);
                }
                NativeCommand::SetGraphicsRootConstantBufferView { index, address } => {
                    list.SetGraphicsRootConstantBufferView(*index, *address)
                }
                NativeCommand::SetComputeRootConstantBufferView { index, address } => {
                    list.SetComputeRootConstantBufferView(*index, *address)
                }
                NativeCommand::SetGraphicsRootDescriptorTable { index, base } => {
                    list.SetGraphicsRootDescriptorTable(*index, gpu(*base))
                }
                NativeCommand::SetComputeRootDescriptorTable { index, base } => {
                    list.SetComputeRootDescriptorTable(*index, gpu(*base))
                }
                NativeCommand::IaSetPrimitiveTopology(topology) => {
                    list.IASetPrimitiveTopology(D3D_PRIMITIVE_TOPOLOGY(*topology as i32))
                }
                NativeCommand::IaSetVertexBuffers { start_slot, views } => {
                    let native: Vec<D3D12_VERTEX_BUFFER_VIEW> = views
                        .iter()
                        .map(|v| D3D12_VERTEX_BUFFER_VIEW {
                            BufferLocation: v.address,
                            SizeInBytes: v.size,
                            StrideInBytes: v.stride,
                        })
                        .collect();
                    list.IASetVertexBuffers(*start_slot, Some(&native));
                }
                NativeCommand::IaSetIndexBuffer(view) => {
                    let native = D3D12_INDEX_BUFFER_VIEW {
                        BufferLocation: view.address,
                        SizeInBytes: view.size,
                        Format: dxgi(view.format),
                    };
                    list.IASetIndexBuffer(Some(&native));
                }
                NativeCommand::RsSetViewports(viewport) => list.RSSetViewports(&[D3D12_VIEWPORT {
                    TopLeftX: viewport.x,
                    TopLeftY: viewport.y,
                    Width: viewport.width,
                    Height: viewport.height,
                    MinDepth: viewport.min_depth,
                    MaxDepth: viewport.max_depth,
                }]),
                NativeCommand::RsSetScissorRects(rect) => list.RSSetScissorRects(&[RECT {
                    left: rect.left,
                    top: rect.top,
                    right: rect.right,
                    bottom: rect.bottom,
                }]),
                NativeCommand::OmSetStencilRef(value) => list.OMSetStencilRef(*value),
                NativeCommand::OmSetRenderTargets { rtvs, dsv } => {
                    let colors: Vec<D3D12_CPU_DESCRIPTOR_HANDLE> = rtvs.iter().map(|d| cpu(*d)).collect();
                    let depth = dsv.map(cpu);
                    list.OMSetRenderTargets(
                        colors.len() as u32,
                        (!colors.is_empty()).then_some(colors.as_ptr()),
                        BOOL::from(false),
                        depth.as_ref().map(|d| d as *const _),
                    );
                }
                NativeCommand::ClearRenderTargetView { rtv, color } => {
                    list.ClearRenderTargetView(cpu(*rtv), color.as_ptr(), None)
                }
                NativeCommand::ClearDepthStencilView {
                    dsv,
                    clear_depth,
                    clear_stencil,
                    depth,
                    stencil,
                } => {
                    let mut flags = D3D12_CLEAR_FLAGS(0);
                    if *clear_depth {
                        flags |= D3D12_CLEAR_FLAG_DEPTH;
                    }
                    if *clear_stencil {
                        flags |= D3D12_CLEAR_FLAG_STENCIL;
                    }
                    list.ClearDepthStencilView(cpu(*dsv), flags, *depth, *stencil, &[]);
                }
                NativeCommand::DiscardResource(resource) => {
                    list.DiscardResource(objects.resource(*resource)?, None)
                }
                NativeCommand::DrawInstanced {
                    vertex_count,
                    instance_count,
                    start_vertex,
                    start_instance,
                } => list.DrawInstanced(*vertex_count, *instance_count, *start_vertex, *start_instance),
                NativeCommand::DrawIndexedInstanced {
                    index_count,
                    instance_count,
                    start_index,
                    base_vertex,
                    start_instance,
                } => list.DrawIndexedInstanced(
                    *index_count,
                    *instance_count,
                    *start_index,
                    *base_vertex,
                    *start_instance,
                ),
                NativeCommand::Dispatch { x, y, z } => list.Dispatch(*x, *y, *z),
            }
        }
        Ok(())
    }
}

impl NativeDevice for WindowsDevice {
    fn adapter_info(&self) -> AdapterInfo {
        self.info.clone()
    }

    fn check_format_support(&self, format: DxgiFormat) -> bool {
        let mut support = D3D12_FEATURE_DATA_FORMAT_SUPPORT {
            Format: dxgi(format),
            ..Default::default()
        };
        let queried = unsafe {
            self.device.CheckFeatureSupport(
                D3D12_FEATURE_FORMAT_SUPPORT,
                &mut support as *mut _ as *mut c_void,
                std::mem::size_of::<D3D12_FEATURE_DATA_FORMAT_SUPPORT>() as u32,
            )
        };
        queried.is_ok() && (support.Support1.0 & D3D12_FORMAT_SUPPORT1_TEXTURE2D.0) != 0
    }

    fn create_committed_resource(
        &self,
        heap: HeapType,
        desc: &ResourceDesc,
        initial_state: ResourceStates,
        clear_value: Option<ClearValue>,
    ) -> Result<ResourceHandle, NativeError> {
        let native_desc = D3D12_RESOURCE_DESC {
            Dimension: D3D12_RESOURCE_DIMENSION(desc.dimension as i32),
            Alignment: 0,
            Width: desc.width,
            Height: desc.height,
            DepthOrArraySize: desc.array_size,
            MipLevels: desc.mip_levels,
            Format: dxgi(desc.format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            Layout: match desc.dimension {
                ResourceDimension::Buffer => D3D12_TEXTURE_LAYOUT_ROW_MAJOR,
                ResourceDimension::Texture2D => D3D12_TEXTURE_LAYOUT_UNKNOWN,
            },
            Flags: D3D12_RESOURCE_FLAGS(desc.flags.bits() as i32),
        };
        let clear = clear_value.map(|value| match value {
            ClearValue::Color { format, color } => D3D12_CLEAR_VALUE {
                Format: dxgi(format),
                Anonymous: D3D12_CLEAR_VALUE_0 { Color: color },
            },
            ClearValue::DepthStencil {
                format,
                depth,
                stencil,
            } => D3D12_CLEAR_VALUE {
                Format: dxgi(format),
                Anonymous: D3D12_CLEAR_VALUE_0 {
                    DepthStencil: D3D12_DEPTH_STENCIL_VALUE {
                        Depth: depth,
                        Stencil: stencil,
                    },
                },
            },
        });
        let mut resource: Option<ID3D12Resource> = None;
        unsafe {
            self.device.CreateCommittedResource(
                &D3D12_HEAP_PROPERTIES {
                    Type: D3D12_HEAP_TYPE(heap as i32),
                    ..Default::default()
                },
                D3D12_HEAP_FLAG_NONE,
                &native_desc,
                states(initial_state),
                clear.as_ref().map(|c| c as *const _),
                &mut resource,
            )
        }
        .map_err(creation_failed("committed resource"))?;
        let resource =
            resource.ok_or_else(|| NativeError::CreationFailed("committed resource".into()))?;
        self.register_resource(resource, heap, desc.width)
    }

    fn release_resource(&self, resource: ResourceHandle) {
        match self.objects().resources.remove(&resource.0) {
            Some(entry) => {
                if !entry.mapped.is_null() {
                    unsafe { entry.resource.Unmap(0, None) };
                }
            }
            None => log::warn!("WindowsDevice: release of unknown resource {resource:?}"),
        }
    }

    fn write_mapped(&self, resource: ResourceHandle, offset: u64, data: &[u8]) -> Result<(), NativeError> {
        let objects = self.objects();
        let entry = objects.resources.get(&resource.0).ok_or(NativeError::InvalidHandle)?;
        let end = offset.checked_add(data.len() as u64);
        if entry.mapped.is_null() || end.map_or(true, |end| end > entry.size) {
            return Err(NativeError::OutOfBounds);
        }
        // SAFETY: the range was checked against the mapped size.
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), entry.mapped.add(offset as usize), data.len());
        }
        Ok(())
    }

    fn read_mapped(&self, resource: ResourceHandle, offset: u64, len: u64) -> Result<Vec<u8>, NativeError> {
        let objects = self.objects();
        let entry = objects.resources.get(&resource.0).ok_or(NativeError::InvalidHandle)?;
        if entry.mapped.is_null() || offset.checked_add(len).map_or(true, |end| end > entry.size) {
            return Err(NativeError::OutOfBounds);
        }
        // SAFETY: the range was checked against the mapped size.
        let bytes = unsafe { std::slice::from_raw_parts(entry.mapped.add(offset as usize), len as usize) };
        Ok(bytes.to_vec())
    }

    fn gpu_virtual_address(&self, resource: ResourceHandle) -> u64 {
        self.objects()
            .resources
            .get(&resource.0)
            .map_or(0, |entry| unsafe { entry.resource.GetGPUVirtualAddress() })
    }

    fn create_descriptor_heap(
        &self,
        kind: DescriptorHeapKind,
        capacity: u32,
        shader_visible: bool,
    ) -> Result<NativeHeap, NativeError> {
        let heap: ID3D12DescriptorHeap = unsafe {
            self.device.CreateDescriptorHeap(&D3D12_DESCRIPTOR_HEAP_DESC {
                Type: heap_kind(kind),
                NumDescriptors: capacity,
                Flags: if shader_visible {
                    D3D12_DESCRIPTOR_HEAP_FLAG_SHADER_VISIBLE
                } else {
                    D3D12_DESCRIPTOR_HEAP_FLAG_NONE
                },
                NodeMask: 0,
            })
        }
        .map_err(creation_failed("descriptor heap"))?;
        let cpu_start = CpuDescriptor(unsafe { heap.GetCPUDescriptorHandleForHeapStart() }.ptr as u64);
        let gpu_start = shader_visible
            .then(|| GpuDescriptor(unsafe { heap.GetGPUDescriptorHandleForHeapStart() }.ptr));
        let increment = unsafe { self.device.GetDescriptorHandleIncrementSize(heap_kind(kind)) };
        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.heaps.insert(id, heap);
        Ok(NativeHeap {
            handle: HeapHandle(id),
            cpu_start,
            gpu_start,
            increment,
        })
    }

    fn release_descriptor_heap(&self, heap: HeapHandle) {
        self.objects().heaps.remove(&heap.0);
    }

    fn create_shader_resource_view(&self, resource: Option<ResourceHandle>, desc: &SrvDesc, dst: CpuDescriptor) {
        let (dimension, anonymous) = match desc.dimension {
            SrvDimension::Texture2D => (
                D3D12_SRV_DIMENSION_TEXTURE2D,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture2D: D3D12_TEX2D_SRV {
                        MostDetailedMip: desc.most_detailed_mip,
                        MipLevels: desc.mip_levels,
                        ..Default::default()
                    },
                },
            ),
            SrvDimension::Texture2DArray => (
                D3D12_SRV_DIMENSION_TEXTURE2DARRAY,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    Texture2DArray: D3D12_TEX2D_ARRAY_SRV {
                        MostDetailedMip: desc.most_detailed_mip,
                        MipLevels: desc.mip_levels,
                        FirstArraySlice: desc.first_slice,
                        ArraySize: desc.array_size,
                        ..Default::default()
                    },
                },
            ),
            SrvDimension::TextureCube => (
                D3D12_SRV_DIMENSION_TEXTURECUBE,
                D3D12_SHADER_RESOURCE_VIEW_DESC_0 {
                    TextureCube: D3D12_TEXCUBE_SRV {
                        MostDetailedMip: desc.most_detailed_mip,
                        MipLevels: desc.mip_levels,
                        ..Default::default()
                    },
                },
            ),
        };
        let native = D3D12_SHADER_RESOURCE_VIEW_DESC {
            Format: dxgi(desc.format),
            ViewDimension: dimension,
            Shader4ComponentMapping: D3D12_DEFAULT_SHADER_4_COMPONENT_MAPPING,
            Anonymous: anonymous,
        };
        let objects = self.objects();
        let target = resource.and_then(|handle| objects.resource(handle).ok());
        unsafe { self.device.CreateShaderResourceView(target, Some(&native), cpu(dst)) };
    }

    fn create_unordered_access_view(&self, resource: ResourceHandle, desc: &UavDesc, dst: CpuDescriptor) {
        let native = if desc.is_array {
            D3D12_UNORDERED_ACCESS_VIEW_DESC {
                Format: dxgi(desc.format),
                ViewDimension: D3D12_UAV_DIMENSION_TEXTURE2DARRAY,
                Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                    Texture2DArray: D3D12_TEX2D_ARRAY_UAV {
                        MipSlice: desc.mip_slice,
                        FirstArraySlice: desc.first_slice,
                        ArraySize: desc.array_size,
                        PlaneSlice: 0,
                    },
                },
            }
        } else {
            D3D12_UNORDERED_ACCESS_VIEW_DESC {
                Format: dxgi(desc.format),
                ViewDimension: D3D12_UAV_DIMENSION_TEXTURE2D,
                Anonymous: D3D12_UNORDERED_ACCESS_VIEW_DESC_0 {
                    Texture2D: D3D12_TEX2D_UAV {
                        MipSlice: desc.mip_slice,
                        PlaneSlice: 0,
                    },
                },
            }
        };
        let objects = self.objects();
        let Ok(target) = objects.resource(resource) else {
            log::warn!("WindowsDevice: UAV for unknown resource {resource:?}");
            return;
        };
        unsafe {
            self.device
                .CreateUnorderedAccessView(target, None, Some(&native), cpu(dst))
        };
    }

    fn create_render_target_view(&self, resource: ResourceHandle, desc: &RtvDesc, dst: CpuDescriptor) {
        let native = D3D12_RENDER_TARGET_VIEW_DESC {
            Format: dxgi(desc.format),
            ViewDimension: D3D12_RTV_DIMENSION_TEXTURE2DARRAY,
            Anonymous: D3D12_RENDER_TARGET_VIEW_DESC_0 {
                Texture2DArray: D3D12_TEX2D_ARRAY_RTV {
                    MipSlice: desc.mip_slice,
                    FirstArraySlice: desc.array_slice,
                    ArraySize: 1,
                    PlaneSlice: 0,
                },
            },
        };
        let objects = self.objects();
        let Ok(target) = objects.resource(resource) else {
            log::warn!("WindowsDevice: RTV for unknown resource {resource:?}");
            return;
        };
        unsafe { self.device.CreateRenderTargetView(target, Some(&native), cpu(dst)) };
    }

    fn create_depth_stencil_view(&self, resource: ResourceHandle, format: DxgiFormat, dst: CpuDescriptor) {
        let native = D3D12_DEPTH_STENCIL_VIEW_DESC {
            Format: dxgi(format),
            ViewDimension: D3D12_DSV_DIMENSION_TEXTURE2D,
            Flags: D3D12_DSV_FLAG_NONE,
            Anonymous: D3D12_DEPTH_STENCIL_VIEW_DESC_0 {
                Texture2D: D3D12_TEX2D_DSV { MipSlice: 0 },
            },
        };
        let objects = self.objects();
        let Ok(target) = objects.resource(resource) else {
            log::warn!("WindowsDevice: DSV for unknown resource {resource:?}");
            return;
        };
        unsafe { self.device.CreateDepthStencilView(target, Some(&native), cpu(dst)) };
    }

    fn create_sampler(&self, desc: &NativeSamplerDesc, dst: CpuDescriptor) {
        unsafe { self.device.CreateSampler(&sampler_desc(desc), cpu(dst)) };
    }

    fn copy_descriptors_simple(&self, count: u32, dst: CpuDescriptor, src: CpuDescriptor, kind: DescriptorHeapKind) {
        unsafe {
            self.device
                .CopyDescriptorsSimple(count, cpu(dst), cpu(src), heap_kind(kind))
        };
    }

    fn create_root_signature(&self, desc: &RootSignatureDesc) -> Result<RootSignatureHandle, NativeError> {
        // Ranges must outlive the parameters that point at them.
        let ranges: Vec<Vec<D3D12_DESCRIPTOR_RANGE>> = desc
            .parameters
            .iter()
            .map(|parameter| match parameter {
                RootParameter::DescriptorTable { ranges, .. } => ranges
                    .iter()
                    .map(|range| D3D12_DESCRIPTOR_RANGE {
                        RangeType: D3D12_DESCRIPTOR_RANGE_TYPE(range.kind as i32),
                        NumDescriptors: range.count,
                        BaseShaderRegister: range.base_register,
                        RegisterSpace: 0,
                        OffsetInDescriptorsFromTableStart: D3D12_DESCRIPTOR_RANGE_OFFSET_APPEND,
                    })
                    .collect(),
                RootParameter::Cbv { .. } => Vec::new(),
            })
            .collect();
        let parameters: Vec<D3D12_ROOT_PARAMETER> = desc
            .parameters
            .iter()
            .zip(&ranges)
            .map(|(parameter, ranges)| match parameter {
                RootParameter::Cbv {
                    register,
                    visibility,
                } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_CBV,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        Descriptor: D3D12_ROOT_DESCRIPTOR {
                            ShaderRegister: *register,
                            RegisterSpace: 0,
                        },
                    },
                    ShaderVisibility: D3D12_SHADER_VISIBILITY(*visibility as i32),
                },
                RootParameter::DescriptorTable { visibility, .. } => D3D12_ROOT_PARAMETER {
                    ParameterType: D3D12_ROOT_PARAMETER_TYPE_DESCRIPTOR_TABLE,
                    Anonymous: D3D12_ROOT_PARAMETER_0 {
                        DescriptorTable: D3D12_ROOT_DESCRIPTOR_TABLE {
                            NumDescriptorRanges: ranges.len() as u32,
                            pDescriptorRanges: ranges.as_ptr(),
                        },
                    },
                    ShaderVisibility: D3D12_SHADER_VISIBILITY(*visibility as i32),
                },
            })
            .collect();
        let samplers: Vec<D3D12_STATIC_SAMPLER_DESC> = desc
            .static_samplers
            .iter()
            .map(|sampler| {
                let native = sampler_desc(&sampler.desc);
                D3D12_STATIC_SAMPLER_DESC {
                    Filter: native.Filter,
                    AddressU: native.AddressU,
                    AddressV: native.AddressV,
                    AddressW: native.AddressW,
                    MipLODBias: native.MipLODBias,
                    MaxAnisotropy: native.MaxAnisotropy,
                    ComparisonFunc: native.ComparisonFunc,
                    BorderColor: static_border(sampler.desc.border_color),
                    MinLOD: native.MinLOD,
                    MaxLOD: native.MaxLOD,
                    ShaderRegister: sampler.register,
                    RegisterSpace: 0,
                    ShaderVisibility: D3D12_SHADER_VISIBILITY(sampler.visibility as i32),
                }
            })
            .collect();
        let native = D3D12_ROOT_SIGNATURE_DESC {
            NumParameters: parameters.len() as u32,
            pParameters: parameters.as_ptr(),
            NumStaticSamplers: samplers.len() as u32,
            pStaticSamplers: samplers.as_ptr(),
            Flags: if desc.allow_input_layout {
                D3D12_ROOT_SIGNATURE_FLAG_ALLOW_INPUT_ASSEMBLER_INPUT_LAYOUT
            } else {
                D3D12_ROOT_SIGNATURE_FLAG_NONE
            },
        };

        let mut blob: Option<ID3DBlob> = None;
        let mut error: Option<ID3DBlob> = None;
        let serialized = unsafe {
            D3D12SerializeRootSignature(&native, D3D_ROOT_SIGNATURE_VERSION_1, &mut blob, Some(&mut error))
        };
        if let Err(err) = serialized {
            let details = error
                .as_ref()
                .map(|e| String::from_utf8_lossy(&blob_bytes(e)).into_owned())
                .unwrap_or_else(|| err.to_string());
            return Err(NativeError::CreationFailed(format!("root signature: {details}")));
        }
        let blob = blob.ok_or_else(|| NativeError::CreationFailed("root signature".into()))?;
        let root: ID3D12RootSignature = unsafe { self.device.CreateRootSignature(0, &blob_bytes(&blob)) }
            .map_err(creation_failed("root signature"))?;
        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.root_signatures.insert(id, root);
        Ok(RootSignatureHandle(id))
    }

    fn release_root_signature(&self, root_signature: RootSignatureHandle) {
        self.objects().root_signatures.remove(&root_signature.0);
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> Result<PipelineHandle, NativeError> {
        let semantics = desc
            .input_layout
            .iter()
            .map(|element| CString::new(element.semantic.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| NativeError::CreationFailed(format!("input semantic: {err}")))?;
        let elements: Vec<D3D12_INPUT_ELEMENT_DESC> = desc
            .input_layout
            .iter()
            .zip(&semantics)
            .map(|(element, semantic)| D3D12_INPUT_ELEMENT_DESC {
                SemanticName: PCSTR(semantic.as_ptr() as *const u8),
                SemanticIndex: element.semantic_index,
                Format: dxgi(element.format),
                InputSlot: element.slot,
                AlignedByteOffset: element.offset,
                InputSlotClass: D3D12_INPUT_CLASSIFICATION(element.classification as i32),
                InstanceDataStepRate: element.step_rate,
            })
            .collect();

        let blend = D3D12_RENDER_TARGET_BLEND_DESC {
            BlendEnable: desc.blend.enabled.into(),
            LogicOpEnable: false.into(),
            SrcBlend: D3D12_BLEND(desc.blend.src as i32),
            DestBlend: D3D12_BLEND(desc.blend.dst as i32),
            BlendOp: D3D12_BLEND_OP(desc.blend.op as i32),
            SrcBlendAlpha: D3D12_BLEND(desc.blend.src_alpha as i32),
            DestBlendAlpha: D3D12_BLEND(desc.blend.dst_alpha as i32),
            BlendOpAlpha: D3D12_BLEND_OP(desc.blend.op_alpha as i32),
            LogicOp: D3D12_LOGIC_OP_NOOP,
            RenderTargetWriteMask: desc.blend.write_mask,
        };
        let mut rtv_formats = [DXGI_FORMAT_UNKNOWN; 8];
        for (slot, format) in rtv_formats.iter_mut().zip(&desc.rtv_formats) {
            *slot = dxgi(*format);
        }

        let objects = self.objects();
        let root = objects
            .root_signatures
            .get(&desc.root_signature.0)
            .ok_or(NativeError::InvalidHandle)?;
        let depth = &desc.depth_stencil;
        let native = D3D12_GRAPHICS_PIPELINE_STATE_DESC {
            pRootSignature: borrowed(root),
            VS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: desc.vertex_shader.as_ptr() as *const c_void,
                BytecodeLength: desc.vertex_shader.len(),
            },
            PS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: desc.pixel_shader.as_ptr() as *const c_void,
                BytecodeLength: desc.pixel_shader.len(),
            },
            BlendState: D3D12_BLEND_DESC {
                AlphaToCoverageEnable: false.into(),
                IndependentBlendEnable: false.into(),
                RenderTarget: [blend; 8],
            },
            SampleMask: u32::MAX,
            RasterizerState: D3D12_RASTERIZER_DESC {
                FillMode: D3D12_FILL_MODE_SOLID,
                CullMode: D3D12_CULL_MODE(desc.rasterizer.cull as i32),
                FrontCounterClockwise: desc.rasterizer.front_counter_clockwise.into(),
                DepthClipEnable: true.into(),
                ..Default::default()
            },
            DepthStencilState: D3D12_DEPTH_STENCIL_DESC {
                DepthEnable: depth.depth_enable.into(),
                DepthWriteMask: if depth.depth_write {
                    D3D12_DEPTH_WRITE_MASK_ALL
                } else {
                    D3D12_DEPTH_WRITE_MASK_ZERO
                },
                DepthFunc: D3D12_COMPARISON_FUNC(depth.depth_func as i32),
                StencilEnable: depth.stencil_enable.into(),
                StencilReadMask: depth.stencil_read_mask,
                StencilWriteMask: depth.stencil_write_mask,
                FrontFace: stencil_face(&depth.front),
                BackFace: stencil_face(&depth.back),
            },
            InputLayout: D3D12_INPUT_LAYOUT_DESC {
                pInputElementDescs: elements.as_ptr(),
                NumElements: elements.len() as u32,
            },
            PrimitiveTopologyType: D3D12_PRIMITIVE_TOPOLOGY_TYPE(desc.topology_type as i32),
            NumRenderTargets: desc.rtv_formats.len().min(8) as u32,
            RTVFormats: rtv_formats,
            DSVFormat: dxgi(desc.dsv_format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            ..Default::default()
        };
        let pipeline: ID3D12PipelineState = unsafe { self.device.CreateGraphicsPipelineState(&native) }
            .map_err(creation_failed("graphics pipeline"))?;
        drop(objects);

        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.pipelines.insert(id, pipeline);
        Ok(PipelineHandle(id))
    }

    fn create_compute_pipeline(
        &self,
        root_signature: RootSignatureHandle,
        compute_shader: &[u8],
    ) -> Result<PipelineHandle, NativeError> {
        let mut objects = self.objects();
        let root = objects
            .root_signatures
            .get(&root_signature.0)
            .ok_or(NativeError::InvalidHandle)?;
        let native = D3D12_COMPUTE_PIPELINE_STATE_DESC {
            pRootSignature: borrowed(root),
            CS: D3D12_SHADER_BYTECODE {
                pShaderBytecode: compute_shader.as_ptr() as *const c_void,
                BytecodeLength: compute_shader.len(),
            },
            ..Default::default()
        };
        let pipeline: ID3D12PipelineState = unsafe { self.device.CreateComputePipelineState(&native) }
            .map_err(creation_failed("compute pipeline"))?;
        let id = objects.allocate_id();
        objects.pipelines.insert(id, pipeline);
        Ok(PipelineHandle(id))
    }

    fn release_pipeline(&self, pipeline: PipelineHandle) {
        self.objects().pipelines.remove(&pipeline.0);
    }

    fn compile_shader(
        &self,
        source: &str,
        profile: &str,
        defines: &[(&str, &str)],
    ) -> Result<Vec<u8>, NativeError> {
        // FXC stops at shader model 5.1.
        let profile = match profile.split_once("_6_") {
            Some((stage, _)) => {
                log::warn!("WindowsDevice: {profile} needs DXC, compiling with {stage}_5_1");
                format!("{stage}_5_1")
            }
            None => profile.to_string(),
        };
        let to_cstring = |s: &str| {
            CString::new(s).map_err(|err| NativeError::ShaderCompilation(err.to_string()))
        };
        let owned = defines
            .iter()
            .map(|(name, value)| Ok((to_cstring(name)?, to_cstring(value)?)))
            .collect::<Result<Vec<_>, NativeError>>()?;
        let mut macros: Vec<D3D_SHADER_MACRO> = owned
            .iter()
            .map(|(name, value)| D3D_SHADER_MACRO {
                Name: PCSTR(name.as_ptr() as *const u8),
                Definition: PCSTR(value.as_ptr() as *const u8),
            })
            .collect();
        macros.push(D3D_SHADER_MACRO::default());
        let entry = to_cstring("main")?;
        let target = to_cstring(&profile)?;

        let mut code: Option<ID3DBlob> = None;
        let mut errors: Option<ID3DBlob> = None;
        let compiled = unsafe {
            D3DCompile(
                source.as_ptr() as *const c_void,
                source.len(),
                None,
                Some(macros.as_ptr()),
                None,
                PCSTR(entry.as_ptr() as *const u8),
                PCSTR(target.as_ptr() as *const u8),
                D3DCOMPILE_ENABLE_STRICTNESS | D3DCOMPILE_OPTIMIZATION_LEVEL3,
                0,
                &mut code,
                Some(&mut errors),
            )
        };
        let diagnostics = errors
            .as_ref()
            .map(|e| String::from_utf8_lossy(&blob_bytes(e)).trim_end_matches('\0').to_string());
        match (compiled, code) {
            (Ok(()), Some(code)) => {
                if let Some(warnings) = diagnostics.filter(|d| !d.is_empty()) {
                    log::debug!("WindowsDevice: shader compiled with warnings: {warnings}");
                }
                Ok(blob_bytes(&code))
            }
            (result, _) => Err(NativeError::ShaderCompilation(diagnostics.unwrap_or_else(|| {
                result.err().map_or_else(|| "no bytecode produced".to_string(), |e| e.to_string())
            }))),
        }
    }

    fn create_fence(&self, initial_value: u64) -> Result<FenceHandle, NativeError> {
        let fence: ID3D12Fence = unsafe { self.device.CreateFence(initial_value, D3D12_FENCE_FLAG_NONE) }
            .map_err(creation_failed("fence"))?;
        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.fences.insert(
            id,
            NativeFence {
                fence,
                last_signaled: initial_value,
            },
        );
        Ok(FenceHandle(id))
    }

    fn signal(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError> {
        let mut objects = self.objects();
        let entry = objects.fences.get_mut(&fence.0).ok_or(NativeError::InvalidHandle)?;
        unsafe { self.queue.Signal(&entry.fence, value) }.map_err(|e| self.device_error(e))?;
        entry.last_signaled = entry.last_signaled.max(value);
        Ok(())
    }

    fn completed_value(&self, fence: FenceHandle) -> u64 {
        self.objects()
            .fences
            .get(&fence.0)
            .map_or(0, |entry| unsafe { entry.fence.GetCompletedValue() })
    }

    fn wait(&self, fence: FenceHandle, value: u64) -> Result<(), NativeError> {
        let (fence, last_signaled) = {
            let objects = self.objects();
            let entry = objects.fences.get(&fence.0).ok_or(NativeError::InvalidHandle)?;
            (entry.fence.clone(), entry.last_signaled)
        };
        if unsafe { fence.GetCompletedValue() } >= value {
            return Ok(());
        }
        if value > last_signaled {
            return Err(NativeError::Other(format!(
                "wait for fence value {value} that was never signaled"
            )));
        }
        // A null event makes the call block until the value is reached.
        unsafe { fence.SetEventOnCompletion(value, HANDLE::default()) }.map_err(|e| self.device_error(e))
    }

    fn execute(&self, list: &CommandList) -> Result<(), NativeError> {
        if list.is_empty() {
            return Ok(());
        }
        let mut submission = self.submission();
        let completed = unsafe { submission.fence.GetCompletedValue() };
        let allocator = match submission.allocators.front() {
            Some((_, used_by)) if *used_by <= completed => submission
                .allocators
                .pop_front()
                .map(|(allocator, _)| allocator)
                .ok_or(NativeError::InvalidHandle)?,
            _ => unsafe { self.device.CreateCommandAllocator(D3D12_COMMAND_LIST_TYPE_DIRECT) }
                .map_err(creation_failed("command allocator"))?,
        };
        unsafe {
            allocator.Reset().map_err(|e| self.device_error(e))?;
            submission
                .list
                .Reset(&allocator, None)
                .map_err(|e| self.device_error(e))?;
        }

        let objects = self.objects();
        let recorded = list
            .commands()
            .iter()
            .try_for_each(|command| self.record(&submission.list, &objects, command));
        drop(objects);
        unsafe { submission.list.Close() }.map_err(|e| self.device_error(e))?;
        recorded?;

        let native_list: ID3D12CommandList = submission
            .list
            .cast()
            .map_err(|e| NativeError::Other(e.to_string()))?;
        unsafe { self.queue.ExecuteCommandLists(&[Some(native_list)]) };
        submission.value += 1;
        let value = submission.value;
        unsafe { self.queue.Signal(&submission.fence, value) }.map_err(|e| self.device_error(e))?;
        submission.allocators.push_back((allocator, value));
        Ok(())
    }

    fn create_swapchain(
        &self,
        window: RawWindowHandle,
        width: u32,
        height: u32,
        buffer_count: u32,
        format: DxgiFormat,
    ) -> Result<SwapchainHandle, NativeError> {
        let RawWindowHandle::Win32(handle) = window else {
            return Err(NativeError::CreationFailed(
                "only Win32 windows can host a D3D12 swapchain".to_string(),
            ));
        };
        let hwnd = HWND(handle.hwnd.get() as *mut c_void);
        let flags = if self.tearing {
            DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING
        } else {
            DXGI_SWAP_CHAIN_FLAG(0)
        };
        let desc = DXGI_SWAP_CHAIN_DESC1 {
            Width: width,
            Height: height,
            Format: dxgi(format),
            SampleDesc: DXGI_SAMPLE_DESC {
                Count: 1,
                Quality: 0,
            },
            BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
            BufferCount: buffer_count,
            Scaling: DXGI_SCALING_STRETCH,
            SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
            Flags: flags.0 as u32,
            ..Default::default()
        };
        let chain: IDXGISwapChain1 = unsafe {
            self.factory
                .CreateSwapChainForHwnd(&self.queue, hwnd, &desc, None, None::<&IDXGIOutput>)
        }
        .map_err(creation_failed("swapchain"))?;
        unsafe { self.factory.MakeWindowAssociation(hwnd, DXGI_MWA_NO_ALT_ENTER) }
            .map_err(creation_failed("window association"))?;
        let chain: IDXGISwapChain3 = chain.cast().map_err(creation_failed("swapchain"))?;

        let mut objects = self.objects();
        let id = objects.allocate_id();
        objects.swapchains.insert(id, NativeSwapchain { chain, flags });
        Ok(SwapchainHandle(id))
    }

    fn resize_swapchain(&self, swapchain: SwapchainHandle, width: u32, height: u32) -> Result<(), NativeError> {
        let (chain, flags) = {
            let objects = self.objects();
            let entry = objects.swapchains.get(&swapchain.0).ok_or(NativeError::InvalidHandle)?;
            (entry.chain.clone(), entry.flags)
        };
        unsafe { chain.ResizeBuffers(0, width, height, DXGI_FORMAT_UNKNOWN, flags) }
            .map_err(|e| self.device_error(e))
    }

    fn swapchain_buffer(&self, swapchain: SwapchainHandle, index: u32) -> Result<ResourceHandle, NativeError> {
        let chain = self
            .objects()
            .swapchains
            .get(&swapchain.0)
            .map(|entry| entry.chain.clone())
            .ok_or(NativeError::InvalidHandle)?;
        let buffer: ID3D12Resource =
            unsafe { chain.GetBuffer(index) }.map_err(creation_failed("swapchain buffer"))?;
        self.register_resource(buffer, HeapType::Default, 0)
    }

    fn current_back_buffer_index(&self, swapchain: SwapchainHandle) -> u32 {
        self.objects()
            .swapchains
            .get(&swapchain.0)
            .map_or(0, |entry| unsafe { entry.chain.GetCurrentBackBufferIndex() })
    }

    fn present(&self, swapchain: SwapchainHandle, sync_interval: u32, allow_tearing: bool) -> Result<(), NativeError> {
        let chain = self
            .objects()
            .swapchains
            .get(&swapchain.0)
            .map(|entry| entry.chain.clone())
            .ok_or(NativeError::InvalidHandle)?;
        let flags = if allow_tearing && self.tearing && sync_interval == 0 {
            DXGI_PRESENT_ALLOW_TEARING
        } else {
            DXGI_PRESENT(0)
        };
        unsafe { chain.Present(sync_interval, flags) }
            .ok()
            .map_err(|e| self.device_error(e))
    }

    fn supports_tearing(&self) -> bool {
        self.tearing
    }
}

impl Drop for WindowsDevice {
    fn drop(&mut self) {
        let submission = self.submission();
        if submission.value > 0 {
            let _ = unsafe { submission.fence.SetEventOnCompletion(submission.value, HANDLE::default()) };
        }
        drop(submission);
        for (_, entry) in self.objects().resources.drain() {
            if !entry.mapped.is_null() {
                unsafe { entry.resource.Unmap(0, None) };
            }
        }
    }
}
